//! `aegis keys`

use serde_json::{json, Value};

use crate::cli::KeysCommand;
use crate::commands::{expect_success, print_json};

/// Runs a key management command against the server API.
pub async fn run(command: KeysCommand, endpoint: &str) -> anyhow::Result<()> {
    let http = reqwest::Client::new();

    match command {
        KeysCommand::Create { set, alg, kid } => {
            let response = http
                .post(format!("{endpoint}/keys/{set}"))
                .json(&json!({"alg": alg, "kid": kid}))
                .send()
                .await?;
            let keys: Value = expect_success(response).await?.json().await?;
            print_json(&keys)
        }

        KeysCommand::Get { set, kid } => {
            let url = match &kid {
                Some(kid) => format!("{endpoint}/keys/{set}/{kid}"),
                None => format!("{endpoint}/keys/{set}"),
            };
            let response = http.get(url).send().await?;
            let keys: Value = expect_success(response).await?.json().await?;
            print_json(&keys)
        }

        KeysCommand::Import { set, file } => {
            let raw = std::fs::read_to_string(&file)?;
            let keys: Value = serde_json::from_str(&raw)?;

            let response = http
                .put(format!("{endpoint}/keys/{set}"))
                .json(&keys)
                .send()
                .await?;
            let imported: Value = expect_success(response).await?.json().await?;
            print_json(&imported)
        }

        KeysCommand::Delete { set, kid } => {
            let url = match &kid {
                Some(kid) => format!("{endpoint}/keys/{set}/{kid}"),
                None => format!("{endpoint}/keys/{set}"),
            };
            let response = http.delete(url).send().await?;
            expect_success(response).await?;
            println!("deleted");
            Ok(())
        }

        KeysCommand::Rotate { set, alg } => {
            // A rotation adds a fresh pair to the set; consumers pick the
            // newest key through the well-known endpoint.
            let response = http
                .post(format!("{endpoint}/keys/{set}"))
                .json(&json!({"alg": alg, "kid": ""}))
                .send()
                .await?;
            let keys: Value = expect_success(response).await?.json().await?;
            print_json(&keys)
        }
    }
}
