// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Archive and cache tooling for the Strata VFS
// Run with: cargo xtask <command>

mod commands;
mod helpers;

use clap::{Parser, Subcommand};
use helpers::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask", version)]
#[command(about = "Archive and cache tooling for the Strata VFS")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a pack archive from the directories listed in a manifest
    Pack {
        /// TOML manifest (defaults apply when the file is absent)
        #[arg(short, long, default_value = "Archive.toml")]
        manifest: PathBuf,
    },

    /// List the entries of a pack archive
    List {
        /// The archive to inspect
        archive: PathBuf,
    },

    /// Load every entry of a pack archive and check its checksum
    Verify {
        /// The archive to verify
        archive: PathBuf,
    },

    /// Read an archive through a file cache and report cache statistics
    Warm {
        /// The archive to read
        archive: PathBuf,

        /// TOML file with cache settings (size, alignment, verify_contents)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// How many times to read every file
        #[arg(short, long, default_value = "2")]
        passes: u32,
    },
}

fn main() {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    println!("{}", BANNER);

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Pack { manifest } => commands::pack::pack(manifest),
        Commands::List { archive } => commands::inspect::list(archive),
        Commands::Verify { archive } => commands::inspect::verify(archive),
        Commands::Warm {
            archive,
            config,
            passes,
        } => commands::warm::warm(archive, config.as_deref(), *passes),
    };

    if let Err(err) = result {
        print_error(&format!("{err:#}"));
        std::process::exit(1);
    }
}
