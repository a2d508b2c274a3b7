//! Ask a local model to chat, write, debug, fix, analyze, summarize, translate or rewrite.
//!
//! # Usage
//!
//! ```bash
//! # One-shot chat
//! goblln why is the sky blue
//!
//! # Generate Rust into a file
//! goblln -c -o add.rs a function that adds two numbers
//!
//! # Debug a file
//! goblln -d -i main.js
//!
//! # Translate a file; the output extension picks the target language
//! goblln --translate -i main.js -o main.py
//!
//! # No prompt and no task: interactive chat
//! goblln
//! ```

use std::process::ExitCode;
use std::time::Duration;

use getopts::{Matches, Options};

use goblln::chat::{ChatConfig, run_interactive};
use goblln::config::{AssistantConfig, parse_timeout};
use goblln::language::language_from_path;
use goblln::render::{LineRenderer, PlainTextRenderer};
use goblln::{Error, Goblln, Ollama, Result, TokenHandler};

const NO_ERRORS_DETECTED_MESSAGE: &str = "No errors were detected in the provided source code.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Chat,
    Code,
    Debug,
    Fix,
    Analyze,
    Summarize,
    Translate,
    Rewrite,
}

#[derive(Debug, Default, PartialEq)]
struct Invocation {
    task: Option<Task>,
    prompt: String,
    input: Option<String>,
    output: Option<String>,
    language: Option<String>,
    error: Option<String>,
    model: Option<String>,
    ollama_host: Option<String>,
    ollama_proxy: Option<String>,
    config: Option<String>,
    timeout: Option<Duration>,
    no_color: bool,
    log: Option<String>,
    help: bool,
}

impl Invocation {
    /// The language of the input, from the input file's extension.
    fn source_language(&self) -> Option<String> {
        self.input.as_deref().and_then(language_from_path)
    }

    /// The language to answer in.  The output file's extension wins when translating or when
    /// no language was given.
    fn target_language(&self) -> Option<String> {
        let from_output = self.output.as_deref().and_then(language_from_path);
        if from_output.is_some() && (self.task == Some(Task::Translate) || self.language.is_none())
        {
            return from_output;
        }
        self.language.clone()
    }

    /// The language `--translate` translates to.  Unlike the other tasks there is no default.
    fn translation_target(&self) -> Result<String> {
        self.target_language().ok_or_else(|| {
            Error::validation(
                "--translate needs a target language; pass --language or an --output file with an extension",
                Some("language".to_string()),
            )
        })
    }
}

fn options() -> Options {
    let mut opts = Options::new();
    opts.optflag("c", "code", "generate source code from a description");
    opts.optflag("d", "debug", "explain the bugs in the input");
    opts.optflag("f", "fix", "correct the input and print the fixed code");
    opts.optflag("a", "analyze", "analyze the input");
    opts.optflag("s", "summarize", "summarize the input");
    opts.optflag("", "translate", "translate the input to another programming language");
    opts.optflag("", "rewrite", "rewrite the input in a natural language");
    opts.optopt("e", "error", "error message to include when fixing", "TEXT");
    opts.optopt("i", "input", "read the prompt or source from PATH", "PATH");
    opts.optopt("o", "output", "write the result to PATH", "PATH");
    opts.optopt("l", "language", "programming (or natural) language", "NAME");
    opts.optopt("m", "model", "model to use (default: gemma2)", "MODEL");
    opts.optopt("", "ollama-host", "Ollama host (default: 127.0.0.1:11434)", "HOST");
    opts.optopt("", "ollama-proxy", "proxy URL for requests to Ollama", "URL");
    opts.optopt("", "config", "YAML configuration file", "PATH");
    opts.optopt("", "timeout", "give up after this many seconds", "SECONDS");
    opts.optopt("", "log", "append requests and streamed lines to PATH", "PATH");
    opts.optflag("", "no-color", "disable ANSI colors/styles");
    opts.optflag("h", "help", "print this help");
    opts
}

fn task_of(matches: &Matches) -> Result<Option<Task>> {
    let flags = [
        ("code", Task::Code),
        ("debug", Task::Debug),
        ("fix", Task::Fix),
        ("analyze", Task::Analyze),
        ("summarize", Task::Summarize),
        ("translate", Task::Translate),
        ("rewrite", Task::Rewrite),
    ];
    let mut selected = flags
        .iter()
        .filter(|(name, _)| matches.opt_present(name))
        .map(|(_, task)| *task);
    let task = selected.next();
    if selected.next().is_some() {
        return Err(Error::validation(
            "choose at most one of --code, --debug, --fix, --analyze, --summarize, --translate, --rewrite",
            Some("task".to_string()),
        ));
    }
    Ok(task)
}

fn parse_invocation(args: &[String]) -> Result<Invocation> {
    let matches = options()
        .parse(args)
        .map_err(|e| Error::validation(e.to_string(), None))?;
    let timeout = matches
        .opt_str("timeout")
        .map(|t| parse_timeout(&t))
        .transpose()?;
    let prompt = matches.free.join(" ");
    let mut task = task_of(&matches)?;
    if task.is_none() && !prompt.trim().is_empty() {
        task = Some(Task::Chat);
    }
    Ok(Invocation {
        task,
        prompt,
        input: matches.opt_str("input"),
        output: matches.opt_str("output"),
        language: matches.opt_str("language"),
        error: matches.opt_str("error"),
        model: matches.opt_str("model"),
        ollama_host: matches.opt_str("ollama-host"),
        ollama_proxy: matches.opt_str("ollama-proxy"),
        config: matches.opt_str("config"),
        timeout,
        no_color: matches.opt_present("no-color"),
        log: matches.opt_str("log"),
        help: matches.opt_present("h"),
    })
}

fn assistant_config(invocation: &Invocation) -> Result<AssistantConfig> {
    let mut config = match invocation.config.as_deref() {
        Some(path) => AssistantConfig::from_file(path)?,
        None => AssistantConfig::new(),
    }
    .with_env();
    if let Some(model) = &invocation.model {
        config.ollama.model = model.clone();
    }
    if let Some(host) = &invocation.ollama_host {
        config.ollama.host = host.clone();
    }
    if invocation.ollama_proxy.is_some() {
        config.ollama.proxy = invocation.ollama_proxy.clone();
    }
    if invocation.timeout.is_some() {
        config = config.with_timeout(invocation.timeout);
    }
    if invocation.log.is_some() {
        config.log_file = invocation.log.clone();
    }
    if invocation.no_color {
        config = config.without_color();
    }
    config.validate()?;
    Ok(config)
}

fn read_input(invocation: &Invocation) -> Result<String> {
    if !invocation.prompt.trim().is_empty() {
        return Ok(invocation.prompt.clone());
    }
    match invocation.input.as_deref() {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| Error::io(format!("failed to read {path}"), err)),
        None => Err(Error::validation(
            "no prompt given; pass it as arguments or with --input",
            Some("input".to_string()),
        )),
    }
}

async fn run_task(
    goblln: &Goblln<Ollama>,
    task: Task,
    invocation: &Invocation,
    content: &str,
    handler: Option<&mut dyn TokenHandler>,
) -> Result<String> {
    let target = invocation.target_language();
    let language = target.clone().or_else(|| invocation.source_language());
    match task {
        Task::Chat => goblln.chat(content, handler).await,
        Task::Code => goblln.generate(content, target.as_deref(), handler).await,
        Task::Debug => goblln.debug(content, language.as_deref(), handler).await,
        Task::Fix => {
            goblln
                .fix(
                    content,
                    language.as_deref(),
                    invocation.error.as_deref(),
                    handler,
                )
                .await
        }
        Task::Analyze => goblln.analyze(content, handler).await,
        Task::Summarize => goblln.summarize(content, handler).await,
        Task::Translate => {
            let to = invocation.translation_target()?;
            goblln
                .translate(
                    content,
                    invocation.source_language().as_deref(),
                    &to,
                    handler,
                )
                .await
        }
        Task::Rewrite => {
            goblln
                .rewrite(content, invocation.language.as_deref(), handler)
                .await
        }
    }
}

async fn run(invocation: Invocation) -> Result<()> {
    let config = assistant_config(&invocation)?;
    let Some(task) = invocation.task else {
        return run_interactive(ChatConfig {
            assistant: config,
            ..ChatConfig::new()
        })
        .await;
    };

    let content = read_input(&invocation)?;
    let goblln = Goblln::from_config(&config)?;
    let abort = goblln.abort_handle();
    ctrlc::set_handler(move || {
        abort.abort();
    })
    .map_err(|e| Error::unknown(format!("failed to install Ctrl+C handler: {e}")))?;

    if let Some(path) = invocation.output.as_deref() {
        let result = run_task(&goblln, task, &invocation, &content, None).await?;
        return std::fs::write(path, format!("{result}\n"))
            .map_err(|err| Error::io(format!("failed to write {path}"), err));
    }

    if task == Task::Debug {
        let mut renderer = LineRenderer::new();
        let result = run_task(&goblln, task, &invocation, &content, Some(&mut renderer)).await?;
        if result == content {
            println!("{NO_ERRORS_DETECTED_MESSAGE}");
        } else {
            renderer.finish()?;
        }
        return Ok(());
    }

    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let result = run_task(&goblln, task, &invocation, &content, Some(&mut renderer)).await?;
    if renderer.tokens_written() == 0 {
        println!("{result}");
    } else {
        renderer.finish_response()?;
    }
    Ok(())
}

fn usage(program: &str) -> String {
    let brief = format!("Usage: {program} [OPTIONS] [PROMPT]...");
    options().usage(&brief)
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "goblln".to_string());
    let args: Vec<String> = args.collect();

    let invocation = match parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("Error: {err}");
            eprint!("{}", usage(&program));
            return ExitCode::FAILURE;
        }
    };
    if invocation.help {
        print!("{}", usage(&program));
        return ExitCode::SUCCESS;
    }

    match run(invocation).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
