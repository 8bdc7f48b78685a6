//! Help text generated from the command tree.

use super::command_parser::{self as cmd, Named};

#[derive(Debug, Default)]
struct HelpInfo {
    /// Name of the group or command
    name: String,
    desc: Option<String>,
    groups: Vec<(String, Option<String>)>,
    commands: Vec<(String, Option<String>)>,
    params: Vec<(String, Option<String>)>,
}

impl HelpInfo {
    fn render(self) -> String {
        let mut out = format!("{}\n", self.name);
        if let Some(desc) = self.desc {
            out.push_str(&format!("  {}\n", desc));
        }
        let sections = [("Groups", self.groups), ("Commands", self.commands), ("Parameters", self.params)];
        for (title, items) in sections {
            if items.is_empty() {
                continue;
            }
            out.push_str(&format!("{}:\n", title));
            let width = items.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
            for (name, desc) in items {
                match desc {
                    Some(desc) => out.push_str(&format!("  {:width$}  {}\n", name, desc, width = width)),
                    None => out.push_str(&format!("  {}\n", name)),
                }
            }
        }
        out.pop();
        out
    }
}

/// Help of the whole tree, or of the group or command named by `words`.
pub fn help(root: &cmd::Node, words: &[&str]) -> Option<String> {
    match words.split_first() {
        None => Some(HelpInfo {
            name: "Available commands".to_string(),
            desc: Some("Type `help <group> [command]` for details".to_string()),
            groups: describe(root.groups.list()),
            commands: describe(root.commands.list()),
            ..Default::default()
        }.render()),
        Some((name, rest)) => help_node(root, name, rest).map(HelpInfo::render),
    }
}

fn describe<'a, T, I>(items: I) -> Vec<(String, Option<String>)>
    where
        T: Named + Described + 'a,
        I: Iterator<Item = &'a T>
{
    items.map(|v| (v.name().to_string(), v.description().map(str::to_string))).collect()
}

trait Described {
    fn description(&self) -> Option<&str>;
}
impl Described for cmd::Group {
    fn description(&self) -> Option<&str> {
        self.help()
    }
}
impl Described for cmd::Command {
    fn description(&self) -> Option<&str> {
        self.help()
    }
}

fn help_node(node: &cmd::Node, name: &str, rest: &[&str]) -> Option<HelpInfo> {
    if let Some(found) = node.groups.find(name) {
        help_group(found, rest)
    } else if let Some(found) = node.commands.find(name) {
        help_command(found, rest)
    } else {
        None
    }
}

fn help_group(group: &cmd::Group, words: &[&str]) -> Option<HelpInfo> {
    match words.split_first() {
        Some((name, rest)) => help_node(group.node(), name, rest)
            .map(|mut info| {
                info.name = format!("{} {}", group.name(), info.name);
                info
            }),
        None => Some(HelpInfo {
            name: format!("{} (group)", group.name()),
            desc: group.help().map(str::to_string),
            groups: describe(group.node().groups.list()),
            commands: describe(group.node().commands.list()),
            ..Default::default()
        }),
    }
}

fn help_command(command: &cmd::Command, words: &[&str]) -> Option<HelpInfo> {
    if !words.is_empty() {
        return None;
    }
    let mut params: Vec<(String, Option<String>)> = command.params().iter()
        .map(|param| {
            let name = format!("-{} <{}>{}", param.name(), param.value_type().as_str(), if param.required() {""} else {" (optional)"});
            (name, param.help().map(str::to_string))
        })
        .collect();
    if let Some(arguments) = &command.arguments {
        params.push((format!("<{}...>", arguments), None));
    }
    Some(HelpInfo {
        name: command.name().to_string(),
        desc: command.help().map(str::to_string),
        params,
        ..Default::default()
    })
}
