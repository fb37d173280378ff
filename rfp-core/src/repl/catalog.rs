//! Console grammar expressed as a static command table.
//!
//! The parser and the `help` command read the same structure, so keywords,
//! defaults and usage lines stay in sync.

use crate::modes::TestModeReference;
use crate::regulatory::{RC1, RC2, RC3, RC4, RC5, RC6, RC7, RadioConfiguration};

use super::grammar::{DownlinkScript, FaultInjection};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Open,
    Close,
    Mode,
    Process,
    Status,
    Version,
    Advance,
    Run,
    Inject,
    Downlink,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubcommandTag {
    Mode(TestModeReference),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceTag {
    Rc(&'static RadioConfiguration),
    BitRate,
    Power,
    Advance,
    Inject(FaultInjection),
    Downlink(DownlinkScript),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSpec {
    None,
    Duration,
    IntegerAssignment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub grammar: &'static Node,
    pub usage: &'static str,
    pub summary: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    End,
    /// One keyword out of `choices`, or `default` when the line ends.
    OptionalChoice {
        choices: &'static [ChoiceBranch],
        default: Option<DefaultChoice>,
    },
    Subcommands(&'static [SubcommandBranch]),
    /// Zero or more `key=value` pairs in any order, each at most once.
    Assignments(&'static [ChoiceBranch]),
    /// Positional value with no keyword.
    Argument {
        tag: ChoiceTag,
        value: ValueSpec,
        next: &'static Node,
    },
    Topic {
        next: &'static Node,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChoiceBranch {
    pub keyword: &'static str,
    pub tag: ChoiceTag,
    pub value: ValueSpec,
    pub next: &'static Node,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultChoice {
    pub tag: ChoiceTag,
    pub next: &'static Node,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubcommandBranch {
    pub name: &'static str,
    pub tag: SubcommandTag,
    pub grammar: &'static Node,
}

const END: Node = Node::End;

const fn keyword(keyword: &'static str, tag: ChoiceTag) -> ChoiceBranch {
    ChoiceBranch {
        keyword,
        tag,
        value: ValueSpec::None,
        next: &END,
    }
}

const fn assignment(keyword: &'static str, tag: ChoiceTag) -> ChoiceBranch {
    ChoiceBranch {
        keyword,
        tag,
        value: ValueSpec::IntegerAssignment,
        next: &END,
    }
}

const RC_CHOICES: [ChoiceBranch; 7] = [
    keyword("rc1", ChoiceTag::Rc(&RC1)),
    keyword("rc2", ChoiceTag::Rc(&RC2)),
    keyword("rc3", ChoiceTag::Rc(&RC3)),
    keyword("rc4", ChoiceTag::Rc(&RC4)),
    keyword("rc5", ChoiceTag::Rc(&RC5)),
    keyword("rc6", ChoiceTag::Rc(&RC6)),
    keyword("rc7", ChoiceTag::Rc(&RC7)),
];

const OPEN_GRAMMAR: Node = Node::OptionalChoice {
    choices: &RC_CHOICES,
    default: Some(DefaultChoice {
        tag: ChoiceTag::Rc(&RC1),
        next: &END,
    }),
};

const MODE_ASSIGNMENTS: [ChoiceBranch; 2] = [
    assignment("bitrate", ChoiceTag::BitRate),
    assignment("power", ChoiceTag::Power),
];

const MODE_OPTIONS: Node = Node::Assignments(&MODE_ASSIGNMENTS);

const fn mode(name: &'static str, reference: TestModeReference) -> SubcommandBranch {
    SubcommandBranch {
        name,
        tag: SubcommandTag::Mode(reference),
        grammar: &MODE_OPTIONS,
    }
}

const MODE_SUBCOMMANDS: [SubcommandBranch; 10] = [
    mode("a", TestModeReference::A),
    mode("b", TestModeReference::B),
    mode("c", TestModeReference::C),
    mode("d", TestModeReference::D),
    mode("e", TestModeReference::E),
    mode("f", TestModeReference::F),
    mode("g", TestModeReference::G),
    mode("j", TestModeReference::J),
    mode("k", TestModeReference::K),
    mode("l", TestModeReference::L),
];

const MODE_GRAMMAR: Node = Node::Subcommands(&MODE_SUBCOMMANDS);

const ADVANCE_GRAMMAR: Node = Node::Argument {
    tag: ChoiceTag::Advance,
    value: ValueSpec::Duration,
    next: &END,
};

const INJECT_CHOICES: [ChoiceBranch; 3] = [
    keyword("exec", ChoiceTag::Inject(FaultInjection::Execution)),
    keyword("network", ChoiceTag::Inject(FaultInjection::Network)),
    keyword("none", ChoiceTag::Inject(FaultInjection::Clear)),
];

const INJECT_GRAMMAR: Node = Node::OptionalChoice {
    choices: &INJECT_CHOICES,
    default: None,
};

const DOWNLINK_CHOICES: [ChoiceBranch; 4] = [
    keyword("pattern", ChoiceTag::Downlink(DownlinkScript::Pattern)),
    keyword("counter", ChoiceTag::Downlink(DownlinkScript::Counter)),
    keyword("corrupt", ChoiceTag::Downlink(DownlinkScript::Corrupt)),
    keyword("none", ChoiceTag::Downlink(DownlinkScript::Silent)),
];

const DOWNLINK_GRAMMAR: Node = Node::OptionalChoice {
    choices: &DOWNLINK_CHOICES,
    default: None,
};

const HELP_GRAMMAR: Node = Node::Topic { next: &END };

const COMMANDS: [CommandSpec; 11] = [
    CommandSpec {
        name: "open",
        tag: CommandTag::Open,
        grammar: &OPEN_GRAMMAR,
        usage: "open [rc1..rc7]",
        summary: "open the stack for a radio configuration (default rc1)",
    },
    CommandSpec {
        name: "close",
        tag: CommandTag::Close,
        grammar: &END,
        usage: "close",
        summary: "close the stack and abandon any run",
    },
    CommandSpec {
        name: "mode",
        tag: CommandTag::Mode,
        grammar: &MODE_GRAMMAR,
        usage: "mode <a|b|c|d|e|f|g|j|k|l> [bitrate=100|600] [power=<dBm>]",
        summary: "start a certification test mode",
    },
    CommandSpec {
        name: "process",
        tag: CommandTag::Process,
        grammar: &END,
        usage: "process",
        summary: "run one dispatcher processing tick",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        grammar: &END,
        usage: "status",
        summary: "show state, mode and progress",
    },
    CommandSpec {
        name: "version",
        tag: CommandTag::Version,
        grammar: &END,
        usage: "version",
        summary: "print the add-on version",
    },
    CommandSpec {
        name: "advance",
        tag: CommandTag::Advance,
        grammar: &ADVANCE_GRAMMAR,
        usage: "advance <duration>",
        summary: "move the bench clock forward (ms or s suffix)",
    },
    CommandSpec {
        name: "run",
        tag: CommandTag::Run,
        grammar: &END,
        usage: "run",
        summary: "advance the bench until the active run finishes",
    },
    CommandSpec {
        name: "inject",
        tag: CommandTag::Inject,
        grammar: &INJECT_GRAMMAR,
        usage: "inject <exec|network|none>",
        summary: "fault reported in the next message status",
    },
    CommandSpec {
        name: "downlink",
        tag: CommandTag::Downlink,
        grammar: &DOWNLINK_GRAMMAR,
        usage: "downlink <pattern|counter|corrupt|none>",
        summary: "payload of the next received downlink",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        grammar: &HELP_GRAMMAR,
        usage: "help [command]",
        summary: "list commands or describe one",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}
