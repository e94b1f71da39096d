use std::path::Path;

use excapture::Result;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    match (args.get(1).map(|s| s.as_str()), args.get(2)) {
        (Some("replay"), Some(path)) => {
            excapture::replay::replay(Path::new(path))
        }
        _ => {
            eprintln!("Usage: excapture replay <scenario.json>");
            std::process::exit(1);
        }
    }
}
