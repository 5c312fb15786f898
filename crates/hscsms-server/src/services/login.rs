// ============================================
// File: crates/hscsms-server/src/services/login.rs
// ============================================
//! # Login State
//!
//! Entered once a client's handshake is verified. Installs persistent
//! (`KEEP`) handlers for account creation and login, each answered with a
//! `ClientboundLoginResult` under the session key.
//!
//! ## Last Modified
//! v0.1.0 - Initial login state

use std::sync::Arc;

use tracing::{debug, info, warn};

use hscsms_core::protocol::{ClientboundLoginResult, ServerboundCreateUser, ServerboundLogin};
use hscsms_core::{HandlerResult, Packet};

use crate::services::client::ServerClient;
use crate::services::users::{UserId, UserStore, UserStoreError};

/// Installs the create-user and login handlers on `client`'s tree.
pub fn install(client: &Arc<ServerClient>, users: Arc<dyn UserStore>) {
    let root = client.connection().node();

    let c = Arc::clone(client);
    let store = Arc::clone(&users);
    root.child_for::<ServerboundCreateUser>()
        .with_packet_handler::<ServerboundCreateUser, _>(move |_, _, packet| {
            let outcome = store.create_user(&packet.0.username, &packet.0.password);
            reply(&c, "create_user", &packet.0.username, outcome);
            HandlerResult::HALT
        });

    let c = Arc::clone(client);
    root.child_for::<ServerboundLogin>()
        .with_packet_handler::<ServerboundLogin, _>(move |_, _, packet| {
            let outcome = users.authenticate(&packet.0.username, &packet.0.password);
            if let Ok(id) = &outcome {
                c.set_user_id(id.clone());
                info!(conn = %c.id(), user_id = %id, "Client logged in");
            }
            reply(&c, "login", &packet.0.username, outcome);
            HandlerResult::HALT
        });

    debug!(conn = %client.id(), "Login state entered");
}

fn reply(
    client: &ServerClient,
    request: &'static str,
    username: &str,
    outcome: Result<UserId, UserStoreError>,
) {
    let result = match outcome {
        Ok(id) => ClientboundLoginResult::ok(id),
        Err(e) => {
            debug!(conn = %client.id(), request, username, reason = e.reason(), "Request refused");
            ClientboundLoginResult::failed(e.reason())
        }
    };
    if let Err(e) = client.send(&Packet::new(result)) {
        warn!(conn = %client.id(), request, "Failed to send login result: {}", e);
    }
}
