//! `aegis token`

use serde_json::Value;
use url::Url;

use crate::cli::TokenCommand;
use crate::commands::{expect_success, print_json};

/// Runs a token utility command.
pub async fn run(command: TokenCommand, endpoint: &str) -> anyhow::Result<()> {
    let http = reqwest::Client::new();

    match command {
        TokenCommand::Client {
            client_id,
            client_secret,
            scope,
        } => {
            let response = http
                .post(format!("{endpoint}/oauth2/token"))
                .basic_auth(&client_id, Some(&client_secret))
                .form(&[("grant_type", "client_credentials"), ("scope", &scope)])
                .send()
                .await?;
            let tokens: Value = expect_success(response).await?.json().await?;
            print_json(&tokens)
        }

        TokenCommand::User {
            client_id,
            redirect_uri,
            scope,
            state,
        } => {
            let mut url = Url::parse(&format!("{endpoint}/oauth2/auth"))?;
            url.query_pairs_mut()
                .append_pair("response_type", "code")
                .append_pair("client_id", &client_id)
                .append_pair("redirect_uri", &redirect_uri)
                .append_pair("scope", &scope)
                .append_pair("state", &state);

            println!("open the following URL in a browser to start the flow:");
            println!("{url}");
            Ok(())
        }

        TokenCommand::Introspect {
            token,
            client_id,
            client_secret,
        } => {
            let response = http
                .post(format!("{endpoint}/oauth2/introspect"))
                .basic_auth(&client_id, Some(&client_secret))
                .form(&[("token", token.as_str())])
                .send()
                .await?;
            let introspection: Value = expect_success(response).await?.json().await?;
            print_json(&introspection)
        }

        TokenCommand::Revoke {
            token,
            client_id,
            client_secret,
        } => {
            let response = http
                .post(format!("{endpoint}/oauth2/revoke"))
                .basic_auth(&client_id, Some(&client_secret))
                .form(&[("token", token.as_str())])
                .send()
                .await?;
            expect_success(response).await?;
            println!("token revoked");
            Ok(())
        }
    }
}
