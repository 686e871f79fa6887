//! Interactive collection selection.
//!
//! Resolution order: explicit flag/config, then the collection remembered
//! in the sidecar, then a numbered prompt against the live collection
//! list. Non-interactive invocations must resolve before the prompt.

use std::io::{self, BufRead, IsTerminal, Write};

use osync_core::{Collection, RemoteGateway};
use tracing::info;

use crate::error::CliError;

pub async fn resolve_collection<G: RemoteGateway>(
    gateway: &G,
    configured: Option<String>,
    remembered: Option<String>,
) -> Result<String, CliError> {
    if let Some(id) = configured {
        return Ok(id);
    }
    if let Some(id) = remembered {
        info!("Using collection {id} from previous sync state");
        return Ok(id);
    }

    if !io::stdin().is_terminal() {
        return Err(CliError::Config(
            "no collection_id configured and stdin is not a terminal".to_string(),
        ));
    }

    let collections = gateway.list_collections().await.map_err(CliError::Core)?;
    if collections.is_empty() {
        return Err(CliError::NoCollection);
    }
    if collections.len() == 1 {
        println!(
            "Using the only collection: {} ({})",
            collections[0].name, collections[0].id
        );
        return Ok(collections[0].id.clone());
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    prompt_from(&collections, &mut input)
}

fn prompt_from<R: BufRead>(
    collections: &[Collection],
    input: &mut R,
) -> Result<String, CliError> {
    println!("Select a collection to sync:");
    for (index, collection) in collections.iter().enumerate() {
        println!("  {}. {} ({})", index + 1, collection.name, collection.id);
    }

    let mut line = String::new();
    loop {
        print!("Collection [1-{}]: ", collections.len());
        io::stdout().flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(CliError::NoCollection);
        }
        if let Some(index) = parse_selection(&line, collections.len()) {
            return Ok(collections[index].id.clone());
        }
        println!("Enter a number between 1 and {}.", collections.len());
    }
}

/// 1-based selection to a 0-based index; anything out of range is `None`.
fn parse_selection(input: &str, len: usize) -> Option<usize> {
    let choice: usize = input.trim().parse().ok()?;
    if (1..=len).contains(&choice) {
        Some(choice - 1)
    } else {
        None
    }
}
