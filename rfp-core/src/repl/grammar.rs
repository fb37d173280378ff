//! Parser for the bench console.
//!
//! Lines are tokenized by [`super::lexer`] and then walked against the static
//! command table in [`super::catalog`] with `winnow` token parsers. Every
//! keyword, assignment or positional value fills one slot of a [`Draft`],
//! which is checked for completeness once the line is consumed.

use core::fmt;
use core::time::Duration;

#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use super::catalog::{self, ChoiceBranch, ChoiceTag, CommandTag, Node, SubcommandTag, ValueSpec};
use super::lexer::{LexError, Span, Token, TokenKind, tokenize};
use crate::message::UlBitRate;
use crate::modes::TestModeReference;
use crate::regulatory::RadioConfiguration;

/// Why a console line was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    /// Input the tokenizer could not classify.
    Stray { text: &'a str, span: Span },
    /// Something else was required at this point; `found` is `None` at the
    /// end of the line.
    Expected {
        what: &'static str,
        found: Option<Token<'a>>,
    },
    /// Literal that does not parse as its kind.
    Malformed { what: &'static str, span: Span },
    /// Well-formed literal outside the accepted set.
    OutOfRange { what: &'static str, span: Span },
    /// Assignment given twice on one line.
    Repeated { key: &'a str, span: Span },
}

impl<'a> ParseError<'a> {
    fn expected(what: &'static str, found: Option<&Token<'a>>) -> Self {
        ParseError::Expected {
            what,
            found: found.cloned(),
        }
    }
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(error) => error.fmt(f),
            ParseError::Stray { text, span } => {
                write!(f, "unsupported input `{text}` at column {}", span.start)
            }
            ParseError::Expected { what, found: None } => {
                write!(f, "expected {what} before end of line")
            }
            ParseError::Expected {
                what,
                found: Some(token),
            } => write!(
                f,
                "expected {what}, found {} `{}` at column {}",
                token.kind.describe(),
                token.text,
                token.span.start
            ),
            ParseError::Malformed { what, span } => {
                write!(f, "malformed {what} at column {}", span.start)
            }
            ParseError::OutOfRange { what, span } => {
                write!(f, "expected {what} at column {}", span.start)
            }
            ParseError::Repeated { key, span } => {
                write!(f, "`{key}` given twice (column {})", span.start)
            }
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];
type Step<'src, T = ()> = Result<T, ErrMode<ParseError<'src>>>;

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for ParseError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        ParseError::expected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Open(OpenCommand),
    Close,
    Mode(ModeCommand),
    Process,
    Status,
    Version,
    /// Commands aimed at the simulated radio rather than the add-on.
    Bench(BenchCommand),
    Help(HelpCommand<'a>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenCommand {
    pub rc: &'static RadioConfiguration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeCommand {
    pub reference: TestModeReference,
    pub bit_rate: Option<UlBitRate>,
    pub tx_power_dbm_eirp: Option<i8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BenchCommand {
    Advance(Duration),
    Run,
    Inject(FaultInjection),
    Downlink(DownlinkScript),
}

/// Fault reported in the status of the next simulated message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultInjection {
    Execution,
    Network,
    Clear,
}

/// Payload of the next simulated downlink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownlinkScript {
    /// The static listening pattern.
    Pattern,
    /// Bytes `0x30..=0x37`.
    Counter,
    /// The listening pattern with one byte flipped.
    Corrupt,
    /// No downlink at all.
    Silent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

/// Parses one console line.
///
/// # Errors
///
/// [`ParseError`] for unknown commands, malformed arguments or trailing input.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = tokenize(line).map_err(ParseError::Lex)?;
    if let Some(stray) = tokens.iter().find(|token| token.kind == TokenKind::Stray) {
        return Err(ParseError::Stray {
            text: stray.text,
            span: stray.span.clone(),
        });
    }

    let mut input = tokens.as_slice();
    let command = match command().parse_next(&mut input) {
        Ok(command) => command,
        Err(ErrMode::Backtrack(error) | ErrMode::Cut(error)) => return Err(error),
        Err(ErrMode::Incomplete(_)) => return Err(ParseError::expected("token", input.first())),
    };

    match input.iter().find(|token| token.kind != TokenKind::LineEnd) {
        Some(extra) => Err(ParseError::expected("end of command", Some(extra))),
        None => Ok(command),
    }
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, ParseError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let checkpoint = input.checkpoint();
        let name = token(TokenKind::Word, "command").parse_next(input)?;
        let Some(spec) = catalog::find(name.text) else {
            input.reset(&checkpoint);
            return Err(ErrMode::Backtrack(ParseError::expected("command", Some(&name))));
        };
        let mut draft = Draft::new(spec.tag);
        walk(spec.grammar, input, &mut draft)?;
        draft.build().map_err(ErrMode::Backtrack)
    }
}

fn token<'src, 'slice>(
    kind: TokenKind,
    what: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, ParseError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let Some((first, rest)) = input.split_first() else {
            return Err(ErrMode::Backtrack(ParseError::expected(what, None)));
        };
        if first.kind != kind {
            return Err(ErrMode::Backtrack(ParseError::expected(what, Some(first))));
        }
        *input = rest;
        Ok(first.clone())
    }
}

/// Next word on the line, or `None` at the end of the line.
fn next_word<'src>(input: &Input<'src, '_>, what: &'static str) -> Step<'src, Option<Token<'src>>> {
    match input.first() {
        None => Ok(None),
        Some(next) if next.kind == TokenKind::LineEnd => Ok(None),
        Some(next) if next.kind == TokenKind::Word => Ok(Some(next.clone())),
        Some(other) => Err(ErrMode::Backtrack(ParseError::expected(what, Some(other)))),
    }
}

fn walk<'src>(node: &'static Node, input: &mut Input<'src, '_>, draft: &mut Draft<'src>) -> Step<'src> {
    match node {
        Node::End => Ok(()),
        Node::OptionalChoice { choices, default } => {
            let what = first_keyword(choices);
            match next_word(input, what)? {
                Some(word) => {
                    let branch = keyword(choices, word.text).ok_or_else(|| {
                        ErrMode::Backtrack(ParseError::expected(what, Some(&word)))
                    })?;
                    let _ = input.next_token();
                    take_branch(branch, input, draft)
                }
                None => match default {
                    Some(fallback) => {
                        draft.fill(fallback.tag, Literal::Bare)?;
                        walk(fallback.next, input, draft)
                    }
                    None => Ok(()),
                },
            }
        }
        Node::Subcommands(branches) => {
            let what = branches.first().map_or("subcommand", |branch| branch.name);
            let word = token(TokenKind::Word, what).parse_next(input)?;
            let Some(branch) = branches
                .iter()
                .find(|branch| branch.name.eq_ignore_ascii_case(word.text))
            else {
                return Err(ErrMode::Backtrack(ParseError::expected(what, Some(&word))));
            };
            draft.select(branch.tag);
            walk(branch.grammar, input, draft)
        }
        Node::Assignments(choices) => {
            let mut given = 0_u32;
            while let Some(word) = next_word(input, first_keyword(choices))? {
                let Some(index) = choices
                    .iter()
                    .position(|choice| choice.keyword.eq_ignore_ascii_case(word.text))
                else {
                    return Err(ErrMode::Backtrack(ParseError::expected(
                        first_keyword(choices),
                        Some(&word),
                    )));
                };
                if given & (1 << index) != 0 {
                    return Err(ErrMode::Cut(ParseError::Repeated {
                        key: word.text,
                        span: word.span,
                    }));
                }
                given |= 1 << index;
                let _ = input.next_token();
                take_branch(&choices[index], input, draft)?;
            }
            Ok(())
        }
        Node::Argument { tag, value, next } => {
            let literal = literal(input, *value)?;
            draft.fill(*tag, literal)?;
            walk(next, input, draft)
        }
        Node::Topic { next } => {
            if let Some(word) = next_word(input, "help topic")? {
                draft.topic = Some(word.text);
                let _ = input.next_token();
            }
            walk(next, input, draft)
        }
    }
}

fn take_branch<'src>(
    branch: &'static ChoiceBranch,
    input: &mut Input<'src, '_>,
    draft: &mut Draft<'src>,
) -> Step<'src> {
    let literal = literal(input, branch.value)?;
    draft.fill(branch.tag, literal)?;
    walk(branch.next, input, draft)
}

fn keyword(choices: &'static [ChoiceBranch], text: &str) -> Option<&'static ChoiceBranch> {
    choices
        .iter()
        .find(|choice| choice.keyword.eq_ignore_ascii_case(text))
}

fn first_keyword(choices: &'static [ChoiceBranch]) -> &'static str {
    choices.first().map_or("keyword", |choice| choice.keyword)
}

/// Value attached to a keyword or positional slot.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Literal {
    Bare,
    Elapsed(Duration),
    Number { value: i32, span: Span },
}

fn literal<'src>(input: &mut Input<'src, '_>, spec: ValueSpec) -> Step<'src, Literal> {
    match spec {
        ValueSpec::None => Ok(Literal::Bare),
        ValueSpec::Duration => {
            let found = token(TokenKind::Duration, "duration such as 500ms or 20s")
                .parse_next(input)?;
            duration(&found).map(Literal::Elapsed).map_err(ErrMode::Cut)
        }
        ValueSpec::IntegerAssignment => {
            token(TokenKind::Assign, "`=`").parse_next(input)?;
            let found = token(TokenKind::Number, "number").parse_next(input)?;
            let value = found.text.parse::<i32>().map_err(|_| {
                ErrMode::Cut(ParseError::Malformed {
                    what: "number",
                    span: found.span.clone(),
                })
            })?;
            Ok(Literal::Number {
                value,
                span: found.span,
            })
        }
    }
}

fn duration<'a>(found: &Token<'a>) -> Result<Duration, ParseError<'a>> {
    let malformed = || ParseError::Malformed {
        what: "duration",
        span: found.span.clone(),
    };
    let (digits, scale) = match found.text.strip_suffix("ms") {
        Some(digits) => (digits, 1),
        None => (found.text.strip_suffix('s').ok_or_else(malformed)?, 1_000),
    };
    let count = digits.parse::<u64>().map_err(|_| malformed())?;
    count
        .checked_mul(scale)
        .map(Duration::from_millis)
        .ok_or_else(malformed)
}

/// Slots collected while walking one command's grammar.
struct Draft<'a> {
    tag: CommandTag,
    rc: Option<&'static RadioConfiguration>,
    mode: Option<TestModeReference>,
    bit_rate: Option<UlBitRate>,
    power: Option<i8>,
    elapsed: Option<Duration>,
    fault: Option<FaultInjection>,
    script: Option<DownlinkScript>,
    topic: Option<&'a str>,
}

impl<'a> Draft<'a> {
    const fn new(tag: CommandTag) -> Self {
        Self {
            tag,
            rc: None,
            mode: None,
            bit_rate: None,
            power: None,
            elapsed: None,
            fault: None,
            script: None,
            topic: None,
        }
    }

    fn select(&mut self, tag: SubcommandTag) {
        match tag {
            SubcommandTag::Mode(reference) => self.mode = Some(reference),
        }
    }

    fn fill(&mut self, tag: ChoiceTag, literal: Literal) -> Step<'a> {
        match (tag, literal) {
            (ChoiceTag::Rc(preset), _) => self.rc = Some(preset),
            (ChoiceTag::Inject(fault), _) => self.fault = Some(fault),
            (ChoiceTag::Downlink(script), _) => self.script = Some(script),
            (ChoiceTag::Advance, Literal::Elapsed(elapsed)) => self.elapsed = Some(elapsed),
            (ChoiceTag::BitRate, Literal::Number { value, span }) => {
                let rate = u16::try_from(value).ok().and_then(UlBitRate::from_bps);
                self.bit_rate = Some(rate.ok_or_else(|| {
                    ErrMode::Cut(ParseError::OutOfRange {
                        what: "bitrate 100 or 600",
                        span,
                    })
                })?);
            }
            (ChoiceTag::Power, Literal::Number { value, span }) => {
                let power = i8::try_from(value).map_err(|_| {
                    ErrMode::Cut(ParseError::OutOfRange {
                        what: "power between -128 and 127 dBm",
                        span,
                    })
                })?;
                self.power = Some(power);
            }
            (ChoiceTag::Advance | ChoiceTag::BitRate | ChoiceTag::Power, _) => {
                return Err(ErrMode::Backtrack(ParseError::expected("value", None)));
            }
        }
        Ok(())
    }

    fn build(self) -> Result<Command<'a>, ParseError<'a>> {
        let missing = |what| ParseError::expected(what, None);
        let command = match self.tag {
            CommandTag::Open => Command::Open(OpenCommand {
                rc: self.rc.ok_or_else(|| missing("radio configuration"))?,
            }),
            CommandTag::Close => Command::Close,
            CommandTag::Mode => Command::Mode(ModeCommand {
                reference: self.mode.ok_or_else(|| missing("mode letter"))?,
                bit_rate: self.bit_rate,
                tx_power_dbm_eirp: self.power,
            }),
            CommandTag::Process => Command::Process,
            CommandTag::Status => Command::Status,
            CommandTag::Version => Command::Version,
            CommandTag::Advance => Command::Bench(BenchCommand::Advance(
                self.elapsed.ok_or_else(|| missing("duration"))?,
            )),
            CommandTag::Run => Command::Bench(BenchCommand::Run),
            CommandTag::Inject => Command::Bench(BenchCommand::Inject(
                self.fault.ok_or_else(|| missing("fault"))?,
            )),
            CommandTag::Downlink => Command::Bench(BenchCommand::Downlink(
                self.script.ok_or_else(|| missing("downlink script"))?,
            )),
            CommandTag::Help => Command::Help(HelpCommand { topic: self.topic }),
        };
        Ok(command)
    }
}
