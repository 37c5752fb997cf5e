//! Demo binary serving a fixed reply on a `repframe` endpoint.
//!
//! Parses CLI arguments, binds the endpoint and serves until Ctrl+C.

mod cli;

use std::{error::Error, time::Duration};

use bytes::Bytes;
use clap::Parser;
use repframe::{
    codec::{BincodeCodec, Request},
    endpoint::EndpointAddress,
    error::HandlerError,
    server::{RepServer, ServerConfig},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = cli::Cli::parse();
    let address: EndpointAddress = cli.address.parse()?;
    let config = ServerConfig {
        address,
        poll_interval: Duration::from_millis(cli.poll_interval_ms),
        error_threshold: cli.error_threshold,
        handler_timeout: cli.handler_timeout_ms.map(Duration::from_millis),
        send_timeout: Duration::from_millis(cli.send_timeout_ms),
    };

    let reply = Bytes::from(cli.reply);
    let handler = move |_: Request| -> Result<Bytes, HandlerError> { Ok(reply.clone()) };

    RepServer::new(BincodeCodec::<Request>::new(), handler)
        .with_config(config)
        .bind()
        .await?
        .run()
        .await;
    Ok(())
}
