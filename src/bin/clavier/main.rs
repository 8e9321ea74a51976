//! clavier - terminal piano
//!
//! Run with: cargo run
//! Import recordings headlessly with: cargo run -- import <file>...

mod app;
mod keymap;
mod ui;

use app::App;
use color_eyre::eyre::eyre;

fn main() -> color_eyre::Result<()> {
    env_logger::init(); // Log to stderr (run with `RUST_LOG=debug`).
    color_eyre::install()?;

    let mut args = std::env::args().skip(1);
    if let Some(command) = args.next() {
        return match command.as_str() {
            "import" => app::import_files(args),
            _ => Err(eyre!(
                "unknown command {command:?} (usage: clavier [import <file>...])"
            )),
        };
    }

    let mut terminal = ratatui::init();
    let result = App::new().and_then(|mut app| app.run(&mut terminal));
    ratatui::restore();
    result
}
