#[macro_use] extern crate clap;

use buildctx::{list_entries, BuildContext, CancellationToken, ContextError, EntrySummary, Recipe};
use clap::{App, ArgMatches};
use env_logger::{from_env, Env};
use futures_util::future::FutureExt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[tokio::main]
async fn main() {
    let yaml = load_yaml!("cli.yml");
    let matches = App::from_yaml(yaml).get_matches();

    let log_level = matches.value_of("log_level").unwrap_or("warn");
    from_env(Env::default().default_filter_or(log_level)).init();

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let result = match matches.subcommand() {
        ("pack", Some(sub)) => pack(sub, &cancel).await,
        ("list", Some(sub)) => list(sub, &cancel).await,
        _ => unreachable!("clap requires a subcommand"),
    };

    if let Err(err) = result {
        log::error!("{}", err);
        std::process::exit(match err {
            ContextError::Cancelled => 130,
            _ => 1,
        });
    }
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        log::warn!("interrupted, cancelling");
        cancel.cancel();
    }
}

fn recipe(matches: &ArgMatches<'_>) -> Result<Recipe, ContextError> {
    let mut recipe = match matches.value_of("root") {
        Some(dir) => Recipe::new(dir),
        None => Recipe::for_current_exe()?,
    };
    if let Some(path) = matches.value_of("dockerfile") {
        recipe = recipe.dockerfile_from_path(path)?;
    }
    if let Some(mount) = matches.value_of("mount") {
        recipe = recipe.mount_point(mount);
    }
    if matches.is_present("no_recurse") {
        recipe = recipe.no_recurse();
    }
    Ok(recipe)
}

fn context(matches: &ArgMatches<'_>) -> Result<BuildContext, ContextError> {
    let mut builder = BuildContext::builder();
    if matches.is_present("unsorted") {
        builder = builder.unsorted_traversal();
    }
    if let Some(level) = matches.value_of("level") {
        let level = level
            .parse()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad compression level"))?;
        builder = builder.compression_level(level);
    }
    Ok(builder.build())
}

async fn pack(matches: &ArgMatches<'_>, cancel: &CancellationToken) -> Result<(), ContextError> {
    let recipe = recipe(matches)?;
    let context = context(matches)?;
    recipe.build_async(&context, cancel).await?;

    let output = matches.value_of("output").map(PathBuf::from);
    let written = context
        .access_async(cancel, move |mut reader| {
            async move {
                let written = match output {
                    Some(path) => {
                        let mut file = tokio::fs::File::create(&path).await?;
                        let written = tokio::io::copy(&mut reader, &mut file).await?;
                        file.flush().await?;
                        written
                    }
                    None => {
                        let mut stdout = tokio::io::stdout();
                        let written = tokio::io::copy(&mut reader, &mut stdout).await?;
                        stdout.flush().await?;
                        written
                    }
                };
                Ok::<u64, ContextError>(written)
            }
            .boxed()
        })
        .await?;

    log::info!("wrote {} byte build context", written);
    context.dispose();
    Ok(())
}

async fn list(matches: &ArgMatches<'_>, cancel: &CancellationToken) -> Result<(), ContextError> {
    let recipe = recipe(matches)?;
    let context = context(matches)?;
    recipe.build_async(&context, cancel).await?;

    let entries = context
        .access_async(cancel, |reader| async move { list_entries(reader) }.boxed())
        .await?;
    context.dispose();

    if matches.is_present("json") {
        let json = serde_json::to_string_pretty(&entries).map_err(std::io::Error::from)?;
        println!("{}", json);
    } else {
        for EntrySummary { path, size } in &entries {
            println!("{:>10} {}", size, path);
        }
    }
    Ok(())
}
