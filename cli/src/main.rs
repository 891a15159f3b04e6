use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use scry_ext2::{Ext2Reader, FileType, MatchMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scry")]
#[command(about = "Read-only ext2 filesystem metadata inspector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show superblock information
    Info {
        /// Device or image file
        image: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List a directory by inode number or absolute path
    Ls {
        /// Device or image file
        image: PathBuf,
        /// Inode number or absolute path (defaults to the root directory)
        #[arg(default_value = "/")]
        target: String,
        /// Include per-entry inode metadata
        #[arg(short, long)]
        long: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show inode metadata
    Stat {
        /// Device or image file
        image: PathBuf,
        /// Inode number or absolute path
        target: String,
        #[arg(long)]
        json: bool,
    },
    /// Show the data block map of an inode
    Blocks {
        /// Device or image file
        image: PathBuf,
        /// Inode number or absolute path
        target: String,
        #[arg(long)]
        json: bool,
    },
    /// Search the directory tree for a file name
    Find {
        /// Device or image file
        image: PathBuf,
        /// Name to search for
        name: String,
        /// Match as a case-insensitive substring instead of exactly
        #[arg(short, long)]
        contains: bool,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { image, json } => {
            let reader = Ext2Reader::open(&image)?;
            let info = reader.superblock_info();

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Filesystem: {} ({})", reader.variant(), image.display());
                if let Some(label) = &info.volume_label {
                    println!("  Label: {}", label);
                }
                if let Some(uuid) = &info.uuid {
                    println!("  UUID: {}", uuid);
                }
                println!("  Block size: {} bytes", info.block_size);
                println!(
                    "  Blocks: {} total, {} free",
                    info.blocks_count, info.free_blocks_count
                );
                println!(
                    "  Inodes: {} total, {} free ({} bytes each)",
                    info.inodes_count, info.free_inodes_count, info.inode_size
                );
                println!(
                    "  Per group: {} blocks, {} inodes",
                    info.blocks_per_group, info.inodes_per_group
                );
                println!("  First data block: {}", info.first_data_block);
                println!("  Revision: {}", info.rev_level);
                println!(
                    "  Mounts: {} of {} max",
                    info.mount_count, info.max_mount_count
                );
                println!("  Last mount: {}", format_time(info.mount_time));
                println!("  Last write: {}", format_time(info.write_time));
            }
            reader.close();
        }
        Commands::Ls {
            image,
            target,
            long,
            json,
        } => {
            let reader = Ext2Reader::open(&image)?;
            let inode = resolve_target(&reader, &target)?;
            let entries = reader.list_directory(inode)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if long {
                for entry in &entries {
                    match reader.inode_info(entry.inode) {
                        Ok(info) => println!(
                            "{:>8}  {:o}  {:>10}  {:<16}  {}",
                            entry.inode,
                            info.mode & 0o7777,
                            info.size,
                            info.file_type.to_string(),
                            entry.name
                        ),
                        Err(e) => println!("{:>8}  <unreadable: {}>  {}", entry.inode, e, entry.name),
                    }
                }
            } else {
                for entry in &entries {
                    let marker = if entry.file_type == FileType::Directory {
                        "/"
                    } else {
                        ""
                    };
                    println!("{:>8}  {}{}", entry.inode, entry.name, marker);
                }
            }
            reader.close();
        }
        Commands::Stat { image, target, json } => {
            let reader = Ext2Reader::open(&image)?;
            let inode = resolve_target(&reader, &target)?;
            let info = reader.inode_info(inode)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Inode: {}", info.number);
                println!("  Type: {}", info.file_type);
                println!("  Mode: 0{:o}", info.mode & 0o7777);
                println!("  Size: {} bytes", info.size);
                println!("  Links: {}", info.links_count);
                println!("  Owner: {}:{}", info.uid, info.gid);
                println!("  Blocks: {} (512-byte sectors)", info.block_count);
                println!("  Flags: 0x{:x}", info.flags);
                println!("  Accessed: {}", format_time(info.atime));
                println!("  Modified: {}", format_time(info.mtime));
                println!("  Changed: {}", format_time(info.ctime));
                if info.dtime != 0 {
                    println!("  Deleted: {}", format_time(info.dtime));
                }
            }
            reader.close();
        }
        Commands::Blocks { image, target, json } => {
            let reader = Ext2Reader::open(&image)?;
            let inode = resolve_target(&reader, &target)?;
            let map = reader.block_map(inode)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                println!("{} blocks (0 = hole):", map.len());
                for chunk in map.chunks(8) {
                    let line: Vec<String> = chunk.iter().map(|b| b.to_string()).collect();
                    println!("  {}", line.join(" "));
                }
            }
            reader.close();
        }
        Commands::Find {
            image,
            name,
            contains,
            json,
        } => {
            let reader = Ext2Reader::open(&image)?;
            let mode = if contains {
                MatchMode::Substring
            } else {
                MatchMode::Exact
            };
            let results = reader.search(&name, mode)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No matches for '{}'.", name);
            } else {
                for result in &results {
                    println!(
                        "{}  (inode {}, {}, {} bytes)",
                        result.path, result.inode, result.file_type, result.size
                    );
                }
            }
            reader.close();
        }
    }

    Ok(())
}

/// Accept either an inode number or an absolute path as a target.
fn resolve_target(reader: &Ext2Reader, target: &str) -> anyhow::Result<u32> {
    if target.starts_with('/') {
        Ok(reader.resolve_path(target)?)
    } else {
        target.parse::<u32>().map_err(|_| {
            anyhow::anyhow!(
                "target must be an inode number or an absolute path, got '{}'",
                target
            )
        })
    }
}

fn format_time(timestamp: u32) -> String {
    if timestamp == 0 {
        return "-".to_string();
    }
    match Local.timestamp_opt(timestamp as i64, 0).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("@{}", timestamp),
    }
}
