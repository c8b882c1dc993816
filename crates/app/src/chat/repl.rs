use std::path::Path;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use snafu::{ResultExt, Snafu};

use salus_core::{ImageInput, Message, MessagePart, Role};
use salus_i18n::{self as i18n, Lang};

use crate::chat::controller::{ChatController, SendOutcome};
use crate::media;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReplError {
    #[snafu(display("failed to initialize line editor"))]
    InitEditor {
        stage: &'static str,
        source: ReadlineError,
    },
    #[snafu(display("failed to read user input"))]
    ReadInput {
        stage: &'static str,
        source: ReadlineError,
    },
}

pub type ReplResult<T> = Result<T, ReplError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command<'a> {
    Text(&'a str),
    Image { path: &'a str, caption: &'a str },
    ToggleLang,
    Quit,
    Unknown(&'a str),
}

fn parse_command(input: &str) -> Command<'_> {
    match input {
        "/lang" => return Command::ToggleLang,
        "/quit" | "/exit" => return Command::Quit,
        _ => {}
    }

    if let Some(rest) = input.strip_prefix("/image") {
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            // e.g. "/imagery" is ordinary text-looking input, not /image.
            return Command::Unknown(input);
        }
        let rest = rest.trim();
        if rest.is_empty() {
            return Command::Unknown(input);
        }
        let (path, caption) = match rest.split_once(char::is_whitespace) {
            Some((path, caption)) => (path, caption.trim()),
            None => (rest, ""),
        };
        return Command::Image { path, caption };
    }

    if input.starts_with('/') {
        return Command::Unknown(input);
    }

    Command::Text(input)
}

/// Runs the interactive loop until the user quits or input ends.
///
/// Plain input is sent as a text turn; `/image`, `/lang` and `/quit` cover
/// the remaining user intents. Every iteration leaves the controller idle
/// again, so an error never strands the prompt.
pub async fn run(mut controller: ChatController) -> ReplResult<()> {
    let mut editor = DefaultEditor::new().context(InitEditorSnafu {
        stage: "init-editor",
    })?;

    print_header(&controller);
    for message in controller.conversation() {
        render_message(message, controller.lang());
    }

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(source) => {
                return Err(source).context(ReadInputSnafu { stage: "read-line" });
            }
        };
        let _ = editor.add_history_entry(line.as_str());

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match parse_command(input) {
            Command::Quit => break,
            Command::ToggleLang => {
                controller.toggle_lang();
                print_header(&controller);
            }
            Command::Unknown(command) => {
                tracing::debug!(command, "unrecognized command");
                println!("{}", i18n::translate(controller.lang(), "commands_hint"));
            }
            Command::Image { path, caption } => match media::load_image(Path::new(path)) {
                Ok(image) => dispatch(&mut controller, caption, Some(image)).await,
                Err(error) => eprintln!("{error}"),
            },
            Command::Text(text) => dispatch(&mut controller, text, None).await,
        }
    }

    Ok(())
}

async fn dispatch(controller: &mut ChatController, text: &str, image: Option<ImageInput>) {
    println!("{}", i18n::translate(controller.lang(), "thinking"));

    match controller.send(text, image).await {
        SendOutcome::Ignored => {}
        SendOutcome::Replied(message) | SendOutcome::Failed(message) => {
            render_message(&message, controller.lang());
        }
    }

    if let Some(banner) = controller.take_banner() {
        eprintln!("{banner}");
    }
}

fn print_header(controller: &ChatController) {
    let lang = controller.lang();
    println!("=== {} ===", i18n::translate(lang, "title"));
    println!("{}", i18n::translate(lang, "input_placeholder"));
    println!(
        "{} (/lang -> {})",
        i18n::translate(lang, "commands_hint"),
        i18n::translate(lang, "lang_toggle")
    );
}

fn render_message(message: &Message, lang: Lang) {
    let label = match message.role {
        Role::User => i18n::translate(lang, "role_user"),
        Role::Model => i18n::translate(lang, "role_model"),
    };

    for part in &message.parts {
        match part {
            MessagePart::Text { text } => println!("{label}: {text}"),
            MessagePart::InlineImage { inline_data } => println!(
                "{label}: {}",
                i18n::translate_with(
                    lang,
                    "image_placeholder",
                    &[("mimeType", inline_data.mime_type.as_str())],
                )
            ),
        }
    }
}
