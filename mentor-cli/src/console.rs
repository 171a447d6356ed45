use mentor_memory::{MemoryEngine, QualityVerdict};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

const HELP: &str = "Commands: /new starts a fresh conversation, /stats shows memory sizes, \
                    /quit exits.";

/// Interactive conversation loop over one engine.
///
/// Each `/new` starts a separate session; the memory itself is shared.
pub async fn run_console(engine: &MemoryEngine) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut session = engine.new_session();

    println!("Mentor ready. {HELP}\n");

    loop {
        let line = match rl.readline("You: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        rl.add_history_entry(input)?;

        match input {
            "/quit" | "/exit" | "exit" | "quit" => break,
            "/help" => println!("{HELP}\n"),
            "/new" => {
                session = engine.new_session();
                println!("Started a new conversation.\n");
            }
            "/stats" => {
                let stats = engine.stats().await;
                println!(
                    "{} parent documents, {} index entries\n",
                    stats.parents, stats.index_entries
                );
            }
            question => match engine.ask(&mut session, question).await {
                Ok(answer) => {
                    println!("\nMentor: {}\n", answer.text);
                    if let QualityVerdict::Evaluated { passes: false, issues, .. } = &answer.verdict
                    {
                        println!("(quality check flagged: {})\n", issues.join("; "));
                    }
                }
                Err(e) => eprintln!("error: {e}\n"),
            },
        }
    }

    println!("Goodbye.");
    Ok(())
}
