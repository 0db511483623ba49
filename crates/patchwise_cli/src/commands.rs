#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Open(String),
    Add(String),
    Remove(String),
    Context,
    Model(Option<String>),
    /// Turn index to apply; `None` picks the latest turn with changes.
    Apply(Option<usize>),
    Quit,
    Usage(&'static str),
    Unknown(String),
}

pub const HELP_LINES: [&str; 10] = [
    "type a message to ask about the active file",
    "/open <path>     focus a file in the workspace",
    "/add <path>      include a file as context",
    "/remove <path>   stop including a context file",
    "/context         list the active file and context files",
    "/model [id]      show or select the model",
    "/apply [turn]    write a proposal (latest by default)",
    "/clear           start a new conversation",
    "/help            show this help",
    "/quit            exit",
];

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, argument) = match trimmed.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (trimmed, ""),
    };
    let argument = (!argument.is_empty()).then(|| argument.to_string());

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/clear" => SlashCommand::Clear,
        "/context" => SlashCommand::Context,
        "/quit" | "/exit" => SlashCommand::Quit,
        "/model" => SlashCommand::Model(argument),
        "/open" => argument.map_or(SlashCommand::Usage("/open <path>"), SlashCommand::Open),
        "/add" => argument.map_or(SlashCommand::Usage("/add <path>"), SlashCommand::Add),
        "/remove" => argument.map_or(SlashCommand::Usage("/remove <path>"), SlashCommand::Remove),
        "/apply" => match argument.as_deref().map(str::parse::<usize>) {
            None => SlashCommand::Apply(None),
            Some(Ok(turn)) => SlashCommand::Apply(Some(turn)),
            Some(Err(_)) => SlashCommand::Usage("/apply [turn]"),
        },
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}
