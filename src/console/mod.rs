//! Administration console
//!
//! Line-oriented shell over the draw engine. Every line is matched against the command tree,
//! run, and the snapshot file is saved after each command that changes the raffle.

pub mod command_parser;
mod help;

use std::{error::Error, io::Write, path::PathBuf, sync::Arc};

use drawdesk_core::{
    AddedTickets, Category, DrawEngine, DrawError, DrawRequest, DrawResult, GroupSize, MultiResult, Prize, PrizeId,
    Ticket, TicketOwner,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{audit::DrawJournal, export, import, log_error, log_warn, store::SnapshotFile};
use command_parser::{self as cmd, matching, split_shell, ValueType};

type CommandResult = Result<String, Box<dyn Error + Send + Sync>>;

/// Answer of the console to a line
#[derive(Debug, PartialEq)]
pub enum Reply {
    Text(String),
    Quit,
}

pub struct Console {
    engine: Arc<DrawEngine>,
    store: SnapshotFile,
    journal: DrawJournal,
    export_dir: PathBuf,
    commands: cmd::Node,
}

/// The command tree of the console
pub fn commands() -> cmd::Node {
    let category = || cmd::Argument::new("category").set_help("Category label, e.g. A").set_required(true);
    let size = || cmd::Argument::new("size")
        .set_help("Number of winners")
        .set_value_type(ValueType::Integer)
        .set_required(true);
    cmd::Node::new()
        .add_group(cmd::Group::new("tickets")
            .set_help("Manage the ticket pool")
            .add_command(cmd::Command::new("add")
                .set_help("Add tickets, separated by spaces or commas")
                .set_arguments("tickets")
            )
            .add_command(cmd::Command::new("range")
                .set_help("Add every ticket from start to end")
                .add_param(cmd::Argument::new("start").set_value_type(ValueType::Integer).set_required(true))
                .add_param(cmd::Argument::new("end").set_value_type(ValueType::Integer).set_required(true))
            )
            .add_command(cmd::Command::new("import")
                .set_help("Add the tickets of a CSV or text file")
                .add_param(cmd::Argument::new("file").set_value_type(ValueType::Path).set_required(true))
            )
            .add_command(cmd::Command::new("remove")
                .set_help("Remove tickets from the pool")
                .set_arguments("tickets")
            )
            .add_command(cmd::Command::new("clear").set_help("Empty the pool"))
            .add_command(cmd::Command::new("owners").set_help("Add every ticket held by a known owner"))
            .add_command(cmd::Command::new("list").set_help("Show the pool"))
        )
        .add_group(cmd::Group::new("owners")
            .set_help("Manage the ticket owners")
            .add_command(cmd::Command::new("add")
                .set_help("Create an owner holding the given tickets")
                .add_param(cmd::Argument::new("name").set_required(true))
                .add_param(cmd::Argument::new("email"))
                .set_arguments("tickets")
            )
            .add_command(cmd::Command::new("update")
                .set_help("Rename an owner and replace its tickets")
                .add_param(cmd::Argument::new("id").set_required(true))
                .add_param(cmd::Argument::new("name").set_required(true))
                .set_arguments("tickets")
            )
            .add_command(cmd::Command::new("delete")
                .set_help("Delete an owner")
                .add_param(cmd::Argument::new("id").set_required(true))
            )
            .add_command(cmd::Command::new("import")
                .set_help("Create the owners of a CSV file with `name,tickets` lines")
                .add_param(cmd::Argument::new("file").set_value_type(ValueType::Path).set_required(true))
            )
            .add_command(cmd::Command::new("clear").set_help("Delete every owner"))
            .add_command(cmd::Command::new("list").set_help("Show the owners"))
        )
        .add_group(cmd::Group::new("categories")
            .set_help("Manage the prize categories")
            .add_command(cmd::Command::new("add")
                .set_help("Create a category")
                .add_param(cmd::Argument::new("name").set_required(true))
            )
            .add_command(cmd::Command::new("delete")
                .set_help("Delete a category without prizes")
                .add_param(cmd::Argument::new("name").set_required(true))
            )
            .add_command(cmd::Command::new("list").set_help("Show the categories"))
        )
        .add_group(cmd::Group::new("prizes")
            .set_help("Manage the prizes")
            .add_command(cmd::Command::new("add")
                .set_help("Create a prize")
                .add_param(cmd::Argument::new("name").set_required(true))
                .add_param(category())
            )
            .add_command(cmd::Command::new("import")
                .set_help("Create the prizes of a CSV file with `name,category` lines")
                .add_param(cmd::Argument::new("file").set_value_type(ValueType::Path).set_required(true))
            )
            .add_command(cmd::Command::new("update")
                .set_help("Rename or move a prize not won yet")
                .add_param(cmd::Argument::new("id").set_required(true))
                .add_param(cmd::Argument::new("name").set_required(true))
                .add_param(category())
            )
            .add_command(cmd::Command::new("delete")
                .set_help("Delete a prize")
                .add_param(cmd::Argument::new("id").set_required(true))
            )
            .add_command(cmd::Command::new("list")
                .set_help("Show the prizes")
                .add_param(cmd::Argument::new("category").set_help("Only this category"))
            )
        )
        .add_group(cmd::Group::new("draw")
            .set_help("Run draws")
            .add_command(cmd::Command::new("run")
                .set_help("Draw winners in a category")
                .add_param(category())
                .add_param(size())
                .add_param(cmd::Argument::new("prize").set_help("Prize to award, single winner only"))
            )
            .add_command(cmd::Command::new("status")
                .set_help("Tell if a draw can start")
                .add_param(category())
                .add_param(size())
            )
            .add_command(cmd::Command::new("results").set_help("Show the results of the last draw"))
            .add_command(cmd::Command::new("clear").set_help("Clear the results of the last draw"))
        )
        .add_group(cmd::Group::new("history")
            .set_help("Past draws")
            .add_command(cmd::Command::new("list").set_help("Show every draw, most recent first"))
            .add_command(cmd::Command::new("export").set_help("Write the history to a CSV file"))
        )
        .add_command(cmd::Command::new("sync").set_help("Reload the raffle from the service"))
        .add_command(cmd::Command::new("reset").set_help("Delete every ticket and the history"))
        .add_command(cmd::Command::new("help").set_help("Show this help").set_arguments("command"))
        .add_command(cmd::Command::new("quit").set_help("Leave the console"))
}

/// Commands after which the snapshot is saved
fn is_mutating(path: &[&str]) -> bool {
    matches!(path,
        ["tickets", "add" | "range" | "import" | "remove" | "clear" | "owners"]
        | ["owners", "add" | "update" | "delete" | "import" | "clear"]
        | ["categories", "add" | "delete"]
        | ["prizes", "add" | "import" | "update" | "delete"]
        | ["draw", "run" | "clear"]
        | ["sync"] | ["reset"]
    )
}

fn category_param(cmd: &matching::Command, name: &str) -> Result<Category, DrawError> {
    cmd.get_parameter(name)
        .and_then(Category::new)
        .ok_or_else(|| DrawError::InvalidInput(format!("Parameter -{} is required", name)))
}
fn required_param<'a>(cmd: &matching::Command<'a>, name: &str) -> Result<&'a str, DrawError> {
    cmd.get_parameter(name)
        .ok_or_else(|| DrawError::InvalidInput(format!("Parameter -{} is required", name)))
}
fn integer_param(cmd: &matching::Command, name: &str) -> Result<u64, DrawError> {
    required_param(cmd, name)?
        .parse()
        .map_err(|_| DrawError::InvalidInput(format!("Parameter -{} expects an integer", name)))
}
fn group_size_param(cmd: &matching::Command) -> Result<GroupSize, DrawError> {
    let size = usize::try_from(integer_param(cmd, "size")?)
        .map_err(|_| DrawError::InvalidInput("Group size is too large".to_string()))?;
    GroupSize::new(size).map_err(|_| DrawError::InvalidInput("Group size must be at least 1".to_string()))
}

fn tickets_of(cmd: &matching::Command) -> Vec<Ticket> {
    cmd.arguments.iter()
        .flat_map(|arg| import::parse_ticket_list(arg))
        .collect()
}

fn added_report(report: AddedTickets) -> String {
    let mut lines = vec![format!("Added {} ticket(s)", report.added.len())];
    if !report.duplicates.is_empty() {
        lines.push(format!("Skipped {} duplicate(s): {}", report.duplicates.len(), join(&report.duplicates)));
    }
    if !report.failed.is_empty() {
        lines.push(format!("{} refused by the service:", report.failed.len()));
        lines.extend(report.failed.iter().map(|(t, e)| format!("  {}: {}", t, e)));
    }
    lines.join("\n")
}
fn join(tickets: &[Ticket]) -> String {
    tickets.iter().map(Ticket::as_str).collect::<Vec<_>>().join(", ")
}
fn owner_line(owner: &TicketOwner) -> String {
    let email = owner.email.as_deref().map(|e| format!(" <{}>", e)).unwrap_or_default();
    format!("[{}] {}{} - {} ticket(s): {}", owner.id, owner.name, email, owner.ticket_numbers.len(), join(&owner.ticket_numbers))
}
fn prize_line(prize: &Prize) -> String {
    let status = match (&prize.assigned_to, prize.is_assigned, prize.id.is_temporary()) {
        (_, _, true) => "pending".to_string(),
        (Some(ticket), _, _) => format!("won by {}", ticket),
        (None, true, _) => "won".to_string(),
        (None, false, _) => "available".to_string(),
    };
    format!("[{}] {} (Category {}) - {}", prize.id, prize.name, prize.category, status)
}
fn result_lines(results: &[DrawResult]) -> String {
    results.iter()
        .enumerate()
        .map(|(i, r)| match &r.owner_name {
            Some(owner) => format!("{}. Ticket {} ({}) wins {}", i + 1, r.ticket, owner, r.prize.name),
            None => format!("{}. Ticket {} wins {}", i + 1, r.ticket, r.prize.name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
fn print_frame(frame: Vec<Ticket>) {
    let mut stdout = std::io::stdout();
    // A failed write only loses a frame
    let _ = write!(stdout, "\r  {}   ", frame.iter().map(Ticket::as_str).collect::<Vec<_>>().join("  "));
    let _ = stdout.flush();
}

impl Console {
    pub fn new(engine: Arc<DrawEngine>, store: SnapshotFile, journal: DrawJournal, export_dir: PathBuf) -> Self {
        Self {
            engine,
            store,
            journal,
            export_dir,
            commands: commands(),
        }
    }

    /// Reads commands on stdin until `quit` or the end of the input.
    pub async fn run(&self) -> Result<(), String> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("drawdesk - type `help` for the list of commands");
        loop {
            print!("> ");
            let _ = std::io::stdout().flush();
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => return Err(format!("Unable to read the console input: {}", e)),
            };
            match self.execute(&line).await {
                Reply::Quit => break,
                Reply::Text(text) if text.is_empty() => (),
                Reply::Text(text) => println!("{}", text),
            }
        }
        Ok(())
    }

    /// Runs one line.
    pub async fn execute(&self, line: &str) -> Reply {
        let args = split_shell(line);
        if args.is_empty() {
            return Reply::Text(String::new());
        }
        let matched = match self.commands.try_match(&args) {
            Ok(matched) => matched,
            Err(e) => return Reply::Text(format!("{}. Type `help` for the list of commands.", e)),
        };
        let path: Vec<&str> = matched.path.iter().copied().collect();
        match path.as_slice() {
            ["quit"] => return Reply::Quit,
            ["help"] => return Reply::Text(
                help::help(&self.commands, &matched.arguments)
                    .unwrap_or_else(|| "No group or command found".to_string())
            ),
            _ => (),
        }
        let result = self.dispatch(&path, &matched).await;
        if is_mutating(&path) {
            self.save().await;
        }
        match result {
            Ok(text) => Reply::Text(text),
            Err(e) => Reply::Text(format!("Error: {}", e)),
        }
    }

    async fn save(&self) {
        let snapshot = self.engine.snapshot().await;
        if let Err(e) = self.store.save(&snapshot).await {
            log_error!("Snapshot not saved to {}: {}", self.store.path().to_string_lossy(), e);
        }
    }

    async fn dispatch(&self, path: &[&str], cmd: &matching::Command<'_>) -> CommandResult {
        match path {
            ["tickets", "add"] => {
                let tickets = tickets_of(cmd);
                if tickets.is_empty() {
                    return Err("No ticket given".into());
                }
                Ok(added_report(self.engine.add_tickets(tickets).await?))
            }
            ["tickets", "range"] => {
                let report = self.engine.add_ticket_range(integer_param(cmd, "start")?, integer_param(cmd, "end")?).await?;
                Ok(added_report(report))
            }
            ["tickets", "import"] => {
                let tickets = import::read_ticket_file(required_param(cmd, "file")?).await?;
                if tickets.is_empty() {
                    return Err("No ticket found in the file".into());
                }
                Ok(added_report(self.engine.add_tickets(tickets).await?))
            }
            ["tickets", "remove"] => {
                let result = self.engine.remove_tickets(&tickets_of(cmd)).await?;
                Ok(self.removed_report(result))
            }
            ["tickets", "clear"] => {
                self.engine.clear_tickets().await?;
                Ok("Ticket pool cleared".to_string())
            }
            ["tickets", "owners"] => {
                let tickets = self.engine.tickets_from_owners().await;
                if tickets.is_empty() {
                    return Err("No owner holds a ticket".into());
                }
                Ok(added_report(self.engine.add_tickets(tickets).await?))
            }
            ["tickets", "list"] => {
                let state = self.engine.state().await;
                Ok(format!("{} ticket(s) in the pool\n{}", state.tickets.len(), join(&state.tickets)))
            }
            ["owners", "add"] => {
                let owner = self.engine.add_owner(required_param(cmd, "name")?, cmd.get_parameter("email"), tickets_of(cmd)).await?;
                Ok(format!("Owner created: {}", owner_line(&owner)))
            }
            ["owners", "update"] => {
                let owner = self.engine.update_owner(required_param(cmd, "id")?, required_param(cmd, "name")?, tickets_of(cmd)).await?;
                Ok(format!("Owner updated: {}", owner_line(&owner)))
            }
            ["owners", "delete"] => {
                let id = required_param(cmd, "id")?;
                self.engine.delete_owner(id).await?;
                Ok(format!("Owner {} deleted", id))
            }
            ["owners", "import"] => self.import_owners(required_param(cmd, "file")?).await,
            ["owners", "clear"] => {
                let result = self.engine.clear_owners().await?;
                let mut lines = vec![format!("Deleted {} owner(s)", result.oks().len())];
                lines.extend(result.errs().iter().map(|(o, e)| format!("  {} kept: {}", o.name, e)));
                Ok(lines.join("\n"))
            }
            ["owners", "list"] => {
                let owners = self.engine.owners().await;
                Ok(if owners.is_empty() {"No owner".to_string()} else {
                    owners.iter().map(owner_line).collect::<Vec<_>>().join("\n")
                })
            }
            ["categories", "add"] => {
                let category = self.engine.add_category(required_param(cmd, "name")?).await?;
                Ok(format!("Category {} created", category))
            }
            ["categories", "delete"] => {
                let category = category_param(cmd, "name")?;
                self.engine.delete_category(&category).await?;
                Ok(format!("Category {} deleted", category))
            }
            ["categories", "list"] => {
                let state = self.engine.state().await;
                let lines: Vec<String> = state.categories.iter()
                    .map(|c| format!("{}: {} prize(s), {} available", c, state.prizes_by_category(c).len(), state.available_prizes(c).len()))
                    .collect();
                Ok(lines.join("\n"))
            }
            ["prizes", "add"] => {
                let prize = self.engine.add_prize(required_param(cmd, "name")?, &category_param(cmd, "category")?).await?;
                Ok(format!("Prize created: {}", prize_line(&prize)))
            }
            ["prizes", "import"] => self.import_prizes(required_param(cmd, "file")?).await,
            ["prizes", "update"] => {
                let id = PrizeId::new(required_param(cmd, "id")?);
                let prize = self.engine.update_prize(&id, required_param(cmd, "name")?, &category_param(cmd, "category")?).await?;
                Ok(format!("Prize updated: {}", prize_line(&prize)))
            }
            ["prizes", "delete"] => {
                let id = PrizeId::new(required_param(cmd, "id")?);
                self.engine.delete_prize(&id).await?;
                Ok(format!("Prize {} deleted", id))
            }
            ["prizes", "list"] => {
                let state = self.engine.state().await;
                let filter = match cmd.get_parameter("category") {
                    Some(_) => Some(category_param(cmd, "category")?),
                    None => None,
                };
                let lines: Vec<String> = state.prizes.iter()
                    .filter(|p| filter.as_ref().map_or(true, |c| &p.category == c))
                    .map(prize_line)
                    .collect();
                Ok(if lines.is_empty() {"No prize".to_string()} else {lines.join("\n")})
            }
            ["draw", "run"] => self.draw(cmd).await,
            ["draw", "status"] => {
                let category = category_param(cmd, "category")?;
                Ok(match self.engine.blocking_reason(&category, group_size_param(cmd)?).await {
                    Some(reason) => format!("Blocked: {}", reason),
                    None => format!("Ready to draw in Category {}", category),
                })
            }
            ["draw", "results"] => {
                let results = self.engine.current_results().await;
                Ok(if results.is_empty() {"No current results".to_string()} else {result_lines(&results)})
            }
            ["draw", "clear"] => {
                self.engine.clear_current_results().await?;
                Ok("Current results cleared".to_string())
            }
            ["history", "list"] => {
                let history = self.engine.history().await;
                if history.is_empty() {
                    return Ok("No draw yet".to_string());
                }
                let lines: Vec<String> = history.iter()
                    .enumerate()
                    .map(|(i, entry)| format!(
                        "Draw #{} - {} - Category {} - {} winner(s)\n{}",
                        history.len() - i,
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.category,
                        entry.group_size,
                        result_lines(&entry.results),
                    ))
                    .collect();
                Ok(lines.join("\n"))
            }
            ["history", "export"] => {
                let (history, owners) = {
                    let state = self.engine.state().await;
                    (state.history.clone(), state.owners.clone())
                };
                let path = export::export_history(&self.export_dir, &history, &owners).await?;
                Ok(format!("History written to {}", path.to_string_lossy()))
            }
            ["sync"] => Ok(match self.engine.refresh().await? {
                true => "Raffle reloaded from the service".to_string(),
                false => "Offline: nothing to reload".to_string(),
            }),
            ["reset"] => {
                self.engine.reset_all().await?;
                Ok("Raffle reset".to_string())
            }
            _ => Err(format!("Command {} not handled", path.join(" ")).into()),
        }
    }

    fn removed_report(&self, result: MultiResult<Ticket, (Ticket, drawdesk_core::ServiceError)>) -> String {
        let mut lines = vec![format!("Removed {} ticket(s)", result.oks().len())];
        lines.extend(result.errs().iter().map(|(t, e)| format!("  {} kept: {}", t, e)));
        lines.join("\n")
    }

    async fn import_prizes(&self, file: &str) -> CommandResult {
        let content = tokio::fs::read_to_string(file).await
            .map_err(|e| format!("Unable to read file {}: {}", file, e))?;
        let mut prizes = Vec::new();
        let mut invalid = Vec::new();
        for (name, category) in import::parse_prize_csv(&content) {
            match Category::new(&category) {
                Some(category) => prizes.push((name, category)),
                None => invalid.push(name),
            }
        }
        let result = self.engine.add_bulk_prizes(prizes).await?;
        let mut lines = vec![format!("Created {} prize(s)", result.oks().len())];
        lines.extend(invalid.iter().map(|name| format!("  {}: category missing", name)));
        lines.extend(result.errs().iter().map(|(name, e)| format!("  {}: {}", name, e)));
        Ok(lines.join("\n"))
    }

    async fn import_owners(&self, file: &str) -> CommandResult {
        let content = tokio::fs::read_to_string(file).await
            .map_err(|e| format!("Unable to read file {}: {}", file, e))?;
        let owners = import::parse_owner_csv(&content);
        if owners.is_empty() {
            return Err("No owner found in the file".into());
        }
        let result = self.engine.add_bulk_owners(owners).await?;
        let mut lines = vec![format!("Created {} owner(s)", result.oks().len())];
        lines.extend(result.errs().iter().map(|(name, e)| format!("  {}: {}", name, e)));
        Ok(lines.join("\n"))
    }

    async fn draw(&self, cmd: &matching::Command<'_>) -> CommandResult {
        let category = category_param(cmd, "category")?;
        let size = group_size_param(cmd)?;
        if let Some(reason) = self.engine.blocking_reason(&category, size).await {
            return Ok(format!("Draw blocked: {}", reason));
        }
        let mut request = DrawRequest::new(category, size);
        if let Some(id) = cmd.get_parameter("prize") {
            request = request.with_prize(PrizeId::new(id));
        }
        let results = self.engine.execute_draw(request, print_frame).await;
        println!();
        let results = results?;
        if results.is_empty() {
            return Ok("No draw: the raffle changed or a draw is already running".to_string());
        }
        if let Some(entry) = self.engine.history().await.into_iter().next() {
            if let Err(e) = self.journal.push(&entry).await {
                log_warn!("Draw not journaled: {}", e);
            }
        }
        Ok(result_lines(&results))
    }
}
