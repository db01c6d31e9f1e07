//! `aegis clients`

use serde_json::{json, Value};

use crate::cli::ClientsCommand;
use crate::commands::{expect_success, print_json};

/// Runs a client management command against the server API.
pub async fn run(command: ClientsCommand, endpoint: &str) -> anyhow::Result<()> {
    let http = reqwest::Client::new();

    match command {
        ClientsCommand::Create {
            id,
            name,
            secret,
            redirect_uris,
            grant_types,
            response_types,
            scopes,
            public,
        } => {
            let body = json!({
                "client_id": id.unwrap_or_default(),
                "client_name": name,
                "client_secret": secret.unwrap_or_default(),
                "redirect_uris": redirect_uris,
                "grant_types": grant_types,
                "response_types": response_types,
                "scopes": scopes,
                "public": public,
            });

            let response = http
                .post(format!("{endpoint}/clients"))
                .json(&body)
                .send()
                .await?;
            let created: Value = expect_success(response).await?.json().await?;
            print_json(&created)
        }

        ClientsCommand::Get { id } => {
            let response = http.get(format!("{endpoint}/clients/{id}")).send().await?;
            let client: Value = expect_success(response).await?.json().await?;
            print_json(&client)
        }

        ClientsCommand::Delete { id } => {
            let response = http
                .delete(format!("{endpoint}/clients/{id}"))
                .send()
                .await?;
            expect_success(response).await?;
            println!("client {id} deleted");
            Ok(())
        }

        ClientsCommand::Import { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let parsed: Value = serde_json::from_str(&raw)?;

            let clients = match parsed {
                Value::Array(items) => items,
                other => vec![other],
            };

            for client in clients {
                let response = http
                    .post(format!("{endpoint}/clients"))
                    .json(&client)
                    .send()
                    .await?;
                let created: Value = expect_success(response).await?.json().await?;
                print_json(&created)?;
            }
            Ok(())
        }
    }
}
