//! Maps command-line tokens to an instruction preset and a run mode.
//!
//! Only the first token may carry flags, bundled behind a single `-`
//! (`-it`, `-n`). A dash-prefixed token anywhere else is query text.

const FLAG_INTERACTIVE: char = 'i';
const FLAG_COMMAND_HELP: char = 't';
const FLAG_FORCE_CONCISE: char = 'f';
const FLAG_NO_CONCISE: char = 'n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Generic,
    CommandExpert,
    Concise,
}

impl Instruction {
    pub fn text(&self) -> &'static str {
        match self {
            Self::Generic => "You are an AI assistant.",
            Self::CommandExpert => {
                "Act as a Linux/CMD/Powershell command expert and help me fix commands. Only provide the command with a minimal comment, as your output will go directly to the terminal."
            }
            Self::Concise => "Stay to the point and say less.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::CommandExpert => "command-expert",
            Self::Concise => "concise",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    OneShot { query: String },
    Interactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub instruction: Instruction,
    pub mode: Mode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FlagSet {
    interactive: bool,
    command_help: bool,
    force_concise: bool,
    no_concise: bool,
}

impl FlagSet {
    fn parse(bundle: &str) -> Self {
        let mut flags = Self::default();
        for flag in bundle.chars() {
            match flag {
                FLAG_INTERACTIVE => flags.interactive = true,
                FLAG_COMMAND_HELP => flags.command_help = true,
                FLAG_FORCE_CONCISE => flags.force_concise = true,
                FLAG_NO_CONCISE => flags.no_concise = true,
                _ => {}
            }
        }
        flags
    }

    fn instruction(&self) -> Instruction {
        // `f` only counts in interactive mode and `n` only in one-shot mode;
        // `t` wins over both.
        match (
            self.command_help,
            self.interactive,
            self.force_concise,
            self.no_concise,
        ) {
            (true, _, _, _) => Instruction::CommandExpert,
            (false, true, true, _) => Instruction::Concise,
            (false, true, false, _) => Instruction::Generic,
            (false, false, _, false) => Instruction::Concise,
            (false, false, _, true) => Instruction::Generic,
        }
    }
}

pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Invocation {
    let Some((first, rest)) = args.split_first() else {
        return Invocation {
            instruction: Instruction::Generic,
            mode: Mode::Interactive,
        };
    };

    if let Some(bundle) = first.as_ref().strip_prefix('-') {
        let flags = FlagSet::parse(bundle);
        let mode = if flags.interactive || rest.is_empty() {
            Mode::Interactive
        } else {
            Mode::OneShot {
                query: join_words(rest),
            }
        };
        return Invocation {
            instruction: flags.instruction(),
            mode,
        };
    }

    Invocation {
        instruction: Instruction::Concise,
        mode: Mode::OneShot {
            query: join_words(args),
        },
    }
}

fn join_words<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|word| word.as_ref())
        .collect::<Vec<&str>>()
        .join(" ")
}
