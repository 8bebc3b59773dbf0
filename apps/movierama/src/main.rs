use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{
    url_state::{InMemoryUrlBar, UrlBar},
    CookieCredentialProvider, MovieApi, MovieBoard,
};
use url::Url;

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the movie API server.
    #[arg(long)]
    server_url: String,
    /// Address-bar URL to restore view state from,
    /// e.g. "http://localhost/?ordering=title&search=alice".
    #[arg(long, default_value = "http://localhost/")]
    url: String,
    /// Cookie string used to source the csrf token for mutating calls.
    #[arg(long, default_value = "")]
    cookies: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let credentials = Arc::new(CookieCredentialProvider::new(args.cookies));
    let api = MovieApi::new(args.server_url, credentials);
    let url_bar = Arc::new(InMemoryUrlBar::new(Url::parse(&args.url)?));
    let board = MovieBoard::mount(api, url_bar.clone()).await?;

    let state = board.state().await;
    println!("ordering: {}", state.ordering);
    if let Some(username) = &state.scope_username {
        println!("scope: {username}");
    }
    for movie in &state.movies {
        println!(
            "#{} {} ({} likes / {} hates)",
            movie.id.0, movie.title, movie.likes_counter, movie.hates_counter
        );
    }
    println!("address bar: {}", url_bar.current());

    Ok(())
}
