//! Schemas of the programs the queue is usually asked to run.

use super::{CmdOption, CommandSchema};

pub const MACROMODEL: &str = "macromodel";
pub const PRIME_MMGBSA: &str = "prime_mmgbsa";

/// `macromodel [-HOST host] [-NJOBS n] [-jobname name] input.com`
pub fn macromodel() -> CommandSchema {
    CommandSchema::new(MACROMODEL)
        .option(CmdOption::cpu("ncpu", "-NJOBS"))
        .option(CmdOption::jobname("-jobname"))
        .option(CmdOption::host("-HOST"))
}

/// `prime_mmgbsa [-HOST host] [-jobname name] complex.mae`
pub fn prime_mmgbsa() -> CommandSchema {
    CommandSchema::new(PRIME_MMGBSA)
        .option(CmdOption::jobname("-jobname"))
        .option(CmdOption::host("-HOST"))
}

/// A program without declared options; the jobname comes from the first input file.
pub fn generic(program: impl Into<String>) -> CommandSchema {
    CommandSchema::new(program)
}

/// Looks up a built-in schema, falling back to a generic one for unknown programs.
pub fn for_program(program: &str) -> CommandSchema {
    match program {
        MACROMODEL => macromodel(),
        PRIME_MMGBSA => prime_mmgbsa(),
        other => generic(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macromodel_command_line_matches_expected_layout() {
        let cmd = macromodel()
            .builder()
            .input_file("in.file")
            .set("ncpu", 4)
            .set("jobname", "x")
            .build()
            .unwrap();
        let line = cmd.render();
        assert!(line.starts_with("macromodel "));
        assert!(line.contains("-NJOBS 4"));
        assert!(line.contains("-jobname x"));
        assert!(line.ends_with(" in.file"));
        assert_eq!(line, "macromodel -NJOBS 4 -jobname x in.file");
    }

    #[test]
    fn macromodel_defaults_to_twelve_cpus_and_derived_jobname() {
        let cmd = macromodel().builder().input_file("in.file").build().unwrap();
        assert_eq!(cmd.render(), "macromodel -NJOBS 12 in.file");
        assert_eq!(cmd.jobname(), "in");
    }

    #[test]
    fn prime_mmgbsa_renders_host_before_jobname() {
        let cmd = prime_mmgbsa()
            .builder()
            .input_file("complex.mae")
            .set("host", "localhost:4")
            .set("jobname", "run1")
            .build()
            .unwrap();
        assert_eq!(
            cmd.render(),
            "prime_mmgbsa -HOST localhost:4 -jobname run1 complex.mae"
        );
    }

    #[test]
    fn unknown_programs_get_a_generic_schema() {
        let schema = for_program("confgen");
        assert_eq!(schema.program(), "confgen");
        assert!(schema.options().is_empty());
        let cmd = schema.builder().input_file("lig.mae").build().unwrap();
        assert_eq!(cmd.jobname(), "lig");
        assert_eq!(cmd.render(), "confgen lig.mae");
    }
}
