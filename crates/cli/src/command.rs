use zhifa_core::LegalDomain;

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Question(String),
    SwitchDomain(LegalDomain),
    ListDomains,
    Quit,
    /// A slash command that could not be understood, with a hint for the user.
    Invalid(String),
}

pub fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    let Some(command) = line.strip_prefix('/') else {
        return Input::Question(line.to_string());
    };

    let (name, argument) = match command.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" => Input::Quit,
        "domains" => Input::ListDomains,
        "domain" if argument.is_empty() => Input::Invalid("usage: /domain <slug>".to_string()),
        "domain" => match argument.parse() {
            Ok(domain) => Input::SwitchDomain(domain),
            Err(error) => Input::Invalid(format!("{error}, try /domains")),
        },
        _ => Input::Invalid(format!("unknown command '/{name}'")),
    }
}
