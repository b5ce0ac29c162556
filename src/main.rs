use std::{net::Ipv4Addr, sync::Arc};

use tracing::info;

use todopage::attachments::AttachmentUrls;
use todopage::config::{Command, Config, USAGE};
use todopage::{auth, create_app, db, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{err}\n{USAGE}");
            std::process::exit(2);
        }
    };

    let config = Config::from_env().expect("loading configuration");
    let db = db::init_db(&config.db_path).expect("initializing database");

    if let Command::IssueToken { owner_id, name } = command {
        let token = auth::generate_token();
        let issued = db::create_api_token(
            &db,
            &owner_id,
            &auth::token_digest(&token),
            name.as_deref(),
        )
        .expect("storing token");
        info!(id = issued.id, owner = %issued.owner_id, "Issued API token");
        println!("{token}");
        return;
    }

    let attachments = AttachmentUrls::new(
        &config.attachment_base_url,
        config.attachment_key.clone(),
        config.upload_url_expiry,
    );

    let state = AppState {
        db,
        attachments: Arc::new(attachments),
        base_path: Arc::new(config.base_path.clone()),
    };
    let app = create_app(state);
    let addr = (Ipv4Addr::UNSPECIFIED, config.port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to port");

    info!("running on {addr:?}");

    axum::serve(listener, app).await.expect("failed serving");
}
