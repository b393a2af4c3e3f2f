// ABOUTME: The `search-url` command - print the search request a sync would use
// ABOUTME: Needs no database settings, so credentials are not validated

use anyhow::Result;

use crate::config::{Config, ConfigSources};
use crate::finn::SearchRequest;

pub fn search_url(sources: &ConfigSources) -> Result<()> {
    let request = build_request(sources)?;

    println!("{}", request);
    for (key, value) in request.params() {
        println!("  {} = {}", key, value);
    }
    Ok(())
}

fn build_request(sources: &ConfigSources) -> Result<SearchRequest> {
    let config = Config::resolve(sources)?;
    SearchRequest::new(&config.run.search_base_url, &config.criteria)
}
