//! Command dispatch. Arguments are parsed by hand; the surface is small
//! enough that a parser dependency buys nothing.

use crate::{
    archive,
    config::AppConfig,
    engine,
    game::GamePaths,
    library::{self, ModDescriptor},
};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

pub fn run(args: &[String]) -> Result<()> {
    let mut root_override: Option<PathBuf> = None;
    let mut rest: Vec<&str> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--root" | "-r" => {
                let value = iter.next().context("--root requires a path")?;
                root_override = Some(PathBuf::from(value));
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("jzmod {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => rest.push(other),
        }
    }

    let mut config = AppConfig::load_or_create()?;
    if let Some(root) = root_override {
        config.game_root = Some(root);
        config.save()?;
    }

    match rest.first().copied().unwrap_or("help") {
        "help" => {
            print_usage();
            Ok(())
        }
        "version" => {
            println!("jzmod {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "status" => cmd_status(&config),
        "list" => cmd_list(&config),
        "enable" => cmd_set_enabled(&mut config, &rest[1..], true),
        "disable" => cmd_set_enabled(&mut config, &rest[1..], false),
        "import" => cmd_import(&config, &rest[1..]),
        "remove" => cmd_remove(&mut config, &rest[1..]),
        "apply" => cmd_apply(&config),
        other => bail!("unknown command: {other} (try `jzmod help`)"),
    }
}

fn print_usage() {
    println!("jzmod: merges enabled mod packages into resources0.jz");
    println!();
    println!("Usage: jzmod [--root <game dir>] <command>");
    println!();
    println!("Commands:");
    println!("  status              Show resolved paths and mod counts");
    println!("  list                List installed mods and enabled state");
    println!("  enable <id>|--all   Enable a mod (appends to apply order)");
    println!("  disable <id>|--all  Disable a mod");
    println!("  import <path>...    Copy package files into the mods dir");
    println!("  remove <id>         Delete a package and disable it");
    println!("  apply               Build extensions/{}", crate::game::BASE_ARCHIVE_NAME);
    println!();
    println!("The game root is remembered after the first --root.");
}

fn game_paths(config: &AppConfig) -> Result<GamePaths> {
    let root = config
        .game_root
        .clone()
        .context("game root not set; run once with --root <game dir>")?;
    let paths = GamePaths::resolve(&root);
    paths.prepare()?;
    Ok(paths)
}

fn scan(config: &AppConfig, paths: &GamePaths) -> Vec<ModDescriptor> {
    library::scan_mods(&paths.mods_dir, &config.enabled_mods)
}

fn cmd_status(config: &AppConfig) -> Result<()> {
    let paths = game_paths(config)?;
    let mods = scan(config, &paths);
    let enabled = mods.iter().filter(|m| m.enabled).count();

    println!("game root:     {}", paths.game_root.display());
    println!(
        "base archive:  {} ({})",
        paths.base_archive.display(),
        if paths.base_archive.exists() {
            "found"
        } else {
            "missing"
        }
    );
    println!(
        "derived:       {} ({})",
        paths.output_archive.display(),
        if paths.output_archive.exists() {
            "present"
        } else {
            "absent"
        }
    );
    println!("mods dir:      {}", paths.mods_dir.display());
    println!("installed:     {}", mods.len());
    println!("enabled:       {enabled}");
    println!(
        "compression:   {}",
        archive::compression_label(archive::select_compression())
    );
    Ok(())
}

fn cmd_list(config: &AppConfig) -> Result<()> {
    let paths = game_paths(config)?;
    let mods = scan(config, &paths);
    if mods.is_empty() {
        println!("No mods installed in {}", paths.mods_dir.display());
        return Ok(());
    }
    for descriptor in &mods {
        let marker = if descriptor.enabled { "*" } else { " " };
        println!(
            "[{marker}] {}  v{} by {}",
            descriptor.id, descriptor.version, descriptor.author
        );
    }
    println!();
    println!("* = enabled; apply order follows the enable order.");
    Ok(())
}

fn cmd_set_enabled(config: &mut AppConfig, args: &[&str], enable: bool) -> Result<()> {
    let verb = if enable { "enable" } else { "disable" };
    let target = *args.first().with_context(|| format!("{verb} <id>|--all"))?;
    let paths = game_paths(config)?;
    let mods = scan(config, &paths);

    if target == "--all" {
        if enable {
            config.enabled_mods = mods.iter().map(|m| m.id.clone()).collect();
        } else {
            config.enabled_mods.clear();
        }
        config.save()?;
        println!("{verb}d all {} mod(s)", mods.len());
        return Ok(());
    }

    if !mods.iter().any(|m| m.id == target) {
        bail!("no installed mod with id {target} (see `jzmod list`)");
    }
    let changed = if enable {
        config.enable(target)
    } else {
        config.disable(target)
    };
    if changed {
        config.save()?;
        println!("{verb}d {target}");
    } else {
        println!("{target} already {verb}d");
    }
    Ok(())
}

fn cmd_import(config: &AppConfig, args: &[&str]) -> Result<()> {
    if args.is_empty() {
        bail!("import <path>...");
    }
    let paths = game_paths(config)?;
    for arg in args {
        let dest = library::import_package(PathBuf::from(arg).as_path(), &paths.mods_dir)?;
        println!("imported {}", dest.display());
    }
    Ok(())
}

fn cmd_remove(config: &mut AppConfig, args: &[&str]) -> Result<()> {
    let target = *args.first().context("remove <id>")?;
    let paths = game_paths(config)?;
    let mods = scan(config, &paths);
    let descriptor = mods
        .iter()
        .find(|m| m.id == target)
        .with_context(|| format!("no installed mod with id {target}"))?;

    library::remove_package(descriptor)?;
    if config.disable(target) {
        config.save()?;
    }
    println!("removed {target}");
    Ok(())
}

fn cmd_apply(config: &AppConfig) -> Result<()> {
    let paths = game_paths(config)?;
    let mods = scan(config, &paths);

    // The persisted enable order is the application order.
    let mut ordered = Vec::new();
    for id in &config.enabled_mods {
        match mods.iter().find(|m| m.id == *id) {
            Some(descriptor) => ordered.push(descriptor.clone()),
            None => log::warn!("enabled mod {id} is no longer installed, skipping"),
        }
    }

    let report = engine::apply_mods(&paths.base_archive, &paths.output_archive, &ordered)?;
    println!("{}", report.message);
    for package in &report.mods {
        let edits: usize = package.blocks.iter().map(|block| block.applied).sum();
        let mut line = format!(
            "  {}: {} asset(s), {} edit(s)",
            package.mod_id, package.assets_injected, edits
        );
        let missed = package.missed_directives();
        if missed > 0 {
            line.push_str(&format!(", {missed} miss(es)"));
        }
        if !package.skipped_targets.is_empty() {
            line.push_str(&format!(
                ", {} target(s) skipped",
                package.skipped_targets.len()
            ));
        }
        if let Some(error) = &package.error {
            line.push_str(&format!(" (failed: {error})"));
        }
        println!("{line}");
    }
    Ok(())
}
