//! Command parser
//!
//! Declarative tree of groups and commands, matched against a line typed in the console.
//!
//! The parser works like a shell command line parser:
//! - Each part of the line is separated by spaces, except quoted parts. `word1 word2 "word 3"`
//! - Groups and commands are keywords at the start of the line, matched recursively: `group [...subgroups...] command`
//! - Dashed parts like `-name value` or `-name "value with spaces"` are parameters.
//! - Other parts are the variadic arguments of the command, when it accepts some.
//!
//! The parser only matches. Running the command is up to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! let prizes = cmd::Group::new("prizes")
//!     .set_help("Manage the prizes")
//!     .add_command(cmd::Command::new("add")
//!         .set_help("Create a prize")
//!         .add_param(cmd::Argument::new("name")
//!             .set_help("Name of the prize")
//!             .set_required(true)
//!         )
//!     );
//! ```
//! **Usage**: `prizes add -name "Mountain bike"`

use std::collections::VecDeque;

/// What a command that matched the parser looks like
pub mod matching {
    use std::collections::VecDeque;
    /// Parameter matched by the parser
    #[derive(Debug, PartialEq)]
    pub struct Parameter<'a> {
        pub name: &'a str,
        pub value: &'a str,
    }
    /// Command matched by the parser
    #[derive(Debug, PartialEq)]
    pub struct Command<'a> {
        /// Path of the command. Example: `["draw", "run"]`
        pub path: VecDeque<&'a str>,
        /// Parameters of the command. Example: `[Parameter { name: "category", value: "A" }]`
        pub params: Vec<Parameter<'a>>,
        /// Variadic arguments
        pub arguments: Vec<&'a str>,
    }
    impl<'a> Command<'a> {
        /// Name of the command. Example: `["draw", "run"]` -> `run`
        pub fn get_command(&self) -> &'a str {
            self.path.back().copied().unwrap_or_default()
        }
        pub fn get_parameter(&self, name: &str) -> Option<&'a str> {
            self.params.iter().find(|p| p.name == name).map(|p| p.value)
        }
    }
}

pub trait Named {
    fn name(&self) -> &str;
}

#[derive(Debug, PartialEq)]
pub enum ParseError<'a> {
    /// The command did not match
    NotMatched,
    /// A group matched, but not what follows
    PartiallyNotMatched(&'a str),
    UnknownParameter(&'a str),
    MissingParameterValue(&'a str),
    /// The value doesn't fit the type of the parameter
    InvalidValue(&'a str, ValueType),
    /// A group was typed without a command
    ExpectedPath(&'a str),
    RequiredParameters(String),
    /// Nothing was typed
    Empty,
}
impl<'a> std::fmt::Display for ParseError<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            ParseError::NotMatched => f.write_str("Unknown command"),
            ParseError::PartiallyNotMatched(v) => write!(f, "Unknown group or command {}", v),
            ParseError::UnknownParameter(v) => write!(f, "Unknown parameter {}", v),
            ParseError::MissingParameterValue(v) => write!(f, "Missing value of parameter {}", v),
            ParseError::InvalidValue(v, vt) => write!(f, "Parameter -{} expects {}", v, vt.as_str()),
            ParseError::RequiredParameters(v) => write!(f, "Parameter -{} is required", v),
            ParseError::ExpectedPath(v) => write!(f, "Group or command expected after {}", v),
            ParseError::Empty => f.write_str("Empty command"),
        }
    }
}

/// Splits a line into arguments. Quoted parts are kept whole.
pub fn split_shell(txt: &str) -> Vec<&str> {
    let mut mode = false;
    txt.split(|c: char| {
        match (mode, c) {
            (_, '\"') => {
                mode = !mode;
                true
            }
            (false, c) => c.is_whitespace(),
            _ => false
        }
    })
    .filter(|s| !s.is_empty())
    .collect()
}

/// Type of the value of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Integer,
    Path,
}
impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "text",
            ValueType::Integer => "integer",
            ValueType::Path => "path",
        }
    }
    fn accepts(&self, value: &str) -> bool {
        match self {
            ValueType::Integer => value.parse::<u64>().is_ok(),
            ValueType::String | ValueType::Path => true,
        }
    }
}

/// Parameter of a command
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    pub help: Option<String>,
    pub value_type: ValueType,
    pub required: bool
}
impl Named for Argument {
    fn name(&self) -> &str {
        &self.name
    }
}
impl Argument {
    pub fn new<S: Into<String>>(name: S) -> Argument {
        Argument {
            name: name.into(),
            help: None,
            value_type: ValueType::String,
            required: false
        }
    }
    pub fn set_help<S: Into<String>>(mut self, h: S) -> Argument {
        self.help = Some(h.into());
        self
    }
    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }
    pub fn set_value_type(mut self, vt: ValueType) -> Argument {
        self.value_type = vt;
        self
    }
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
    pub fn set_required(mut self, req: bool) -> Argument {
        self.required = req;
        self
    }
    pub fn required(&self) -> bool {
        self.required
    }
}

#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    /// Name of the variadic arguments, if the command takes some
    pub arguments: Option<String>,
    pub help: Option<String>,
    pub params: Vec<Argument>
}
impl Named for Command {
    fn name(&self) -> &str {
        &self.name
    }
}
impl Command {
    pub fn new<S: Into<String>>(name: S) -> Command {
        Command {
            name: name.into(),
            arguments: None,
            help: None,
            params: Vec::new()
        }
    }
    pub fn set_help<S: Into<String>>(mut self, h: S) -> Command {
        self.help = Some(h.into());
        self
    }
    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }
    pub fn add_param(mut self, param: Argument) -> Command {
        self.params.push(param);
        self
    }
    pub fn params(&self) -> &[Argument] {
        &self.params
    }
    pub fn set_arguments<S: Into<String>>(mut self, arg: S) -> Command {
        self.arguments = Some(arg.into());
        self
    }

    pub fn try_match<'a>(&'a self, args: &[&'a str]) -> Result<matching::Command<'a>, ParseError<'a>> {
        if args.is_empty() {
            return Err(ParseError::Empty);
        }
        if args[0] != self.name {
            return Err(ParseError::NotMatched);
        }
        let mut params = Vec::new();
        let mut iter_args = args.iter().skip(1);
        let mut arguments: Vec<&str> = Vec::new();
        while let Some(&name) = iter_args.next() {
            let param = match name.strip_prefix('-') {
                Some(stripped) => stripped,
                None if self.arguments.is_some() => {
                    arguments.push(name);
                    continue;
                }
                None => return Err(ParseError::UnknownParameter(name)),
            };
            let def = match self.params.iter().find(|cmdp| cmdp.name == param) {
                Some(def) => def,
                None => return Err(ParseError::UnknownParameter(name)),
            };
            match iter_args.next() {
                Some(&value) if def.value_type.accepts(value) => params.push(matching::Parameter{name: param, value}),
                Some(_) => return Err(ParseError::InvalidValue(param, def.value_type)),
                None => return Err(ParseError::MissingParameterValue(name))
            }
        }
        let mut it_req_missing = self.params.iter()
            .filter(|p| p.required)
            .filter(|p1| !params.iter().any(|p2| p1.name == p2.name));
        if let Some(param_missing) = it_req_missing.next() {
            return Err(ParseError::RequiredParameters(param_missing.name.clone()));
        }
        Ok(matching::Command{
            path: VecDeque::from([args[0]]),
            params,
            arguments
        })
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    help: Option<String>,
    /// Subgroups and commands of the group
    node: Node
}
impl Group {
    pub fn new<S: Into<String>>(name: S) -> Group {
        Group {
            name: name.into(),
            help: None,
            node: Node::new()
        }
    }
    pub fn add_group(mut self, grp: Group) -> Group {
        self.node.groups.add(grp);
        self
    }
    pub fn add_command(mut self, cmd: Command) -> Group {
        self.node.commands.add(cmd);
        self
    }
    pub fn set_help<S: Into<String>>(mut self, h: S) -> Group {
        self.help = Some(h.into());
        self
    }
    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }
    pub fn node(&self) -> &Node {
        &self.node
    }
    pub fn try_match<'a>(&'a self, args: &[&'a str]) -> Result<matching::Command<'a>, ParseError<'a>> {
        if args.is_empty() {
            return Err(ParseError::Empty);
        }
        if args[0] != self.name {
            return Err(ParseError::NotMatched);
        }
        if args.len() == 1 || args[1].starts_with('-') {
            return Err(ParseError::ExpectedPath(args[0]));
        }
        self.node.try_match(&args[1..])
            .map_err(|e| match e {
                ParseError::NotMatched => ParseError::PartiallyNotMatched(args[1]),
                e => e,
            })
            .map(|mut cmd| {
                cmd.path.push_front(args[0]);
                cmd
            })
    }
}
impl Named for Group {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Node of the command tree
///
/// Holds the commands and subgroups of a group, or the top level of the console.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub commands: Container<Command>,
    pub groups: Container<Group>,
}
impl Node {
    pub fn new() -> Node {
        Node {
            commands: Container::new(),
            groups: Container::new()
        }
    }
    pub fn add_group(mut self, grp: Group) -> Node {
        self.groups.add(grp);
        self
    }
    pub fn add_command(mut self, cmd: Command) -> Node {
        self.commands.add(cmd);
        self
    }
    pub fn try_match<'a>(&'a self, args: &[&'a str]) -> Result<matching::Command<'a>, ParseError<'a>> {
        let first = match args.first() {
            Some(first) => *first,
            None => return Err(ParseError::Empty),
        };
        match self.commands.find(first) {
            Some(cmd) => cmd.try_match(args),
            None => match self.groups.find(first) {
                Some(grp) => grp.try_match(args),
                None => Err(ParseError::NotMatched),
            },
        }
    }
}

/// Commands or groups, with distinct names
#[derive(Debug, Clone)]
pub struct Container<T: Named>(Vec<T>);

impl<T: Named> Container<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }
    /// Adds a value. Panics if the name is taken: the tree is static.
    pub fn add(&mut self, value: T) {
        if self.find(value.name()).is_some() {
            panic!("{} is declared twice in the command tree", value.name());
        }
        self.0.push(value);
    }
    pub fn find(&self, name: &str) -> Option<&T> {
        self.0.iter().find(|v| v.name() == name)
    }
    pub fn list(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T: Named> Default for Container<T> {
    fn default() -> Self {
        Self::new()
    }
}
