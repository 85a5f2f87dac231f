//! Run with: cargo run --package server --bin generate-types --features typescript

use std::fs;
use std::path::Path;

fn main() {
    println!("Generating TypeScript types...");

    let out_dir = Path::new("frontend/src/types/generated");

    if let Err(e) = fs::create_dir_all(out_dir) {
        eprintln!("Failed to create output directory: {}", e);
        std::process::exit(1);
    }

    #[cfg(feature = "typescript")]
    {
        use ts_rs::TS;

        tempo_core::SessionStatus::export_all_to(out_dir).expect("Failed to export SessionStatus");
        tempo_core::PhaseStatus::export_all_to(out_dir).expect("Failed to export PhaseStatus");
        tempo_core::Session::export_all_to(out_dir).expect("Failed to export Session");
        tempo_core::PhaseSession::export_all_to(out_dir).expect("Failed to export PhaseSession");
        tempo_core::PhaseView::export_all_to(out_dir).expect("Failed to export PhaseView");
        tempo_core::SessionView::export_all_to(out_dir).expect("Failed to export SessionView");
        tempo_core::PlayerMembership::export_all_to(out_dir)
            .expect("Failed to export PlayerMembership");

        events::EventEnvelope::export_all_to(out_dir).expect("Failed to export EventEnvelope");
        events::Event::export_all_to(out_dir).expect("Failed to export Event");

        orchestrator::JoinResult::export_all_to(out_dir).expect("Failed to export JoinResult");

        websocket::ClientMessage::export_all_to(out_dir).expect("Failed to export ClientMessage");
        websocket::ServerMessage::export_all_to(out_dir).expect("Failed to export ServerMessage");
        websocket::SubscriptionFilter::export_all_to(out_dir)
            .expect("Failed to export SubscriptionFilter");

        server::routes::CreateSessionRequest::export_all_to(out_dir)
            .expect("Failed to export CreateSessionRequest");
        server::routes::ExtendSessionRequest::export_all_to(out_dir)
            .expect("Failed to export ExtendSessionRequest");
        server::routes::JoinSessionRequest::export_all_to(out_dir)
            .expect("Failed to export JoinSessionRequest");
        server::routes::AddPlayerRequest::export_all_to(out_dir)
            .expect("Failed to export AddPlayerRequest");
    }

    println!("TypeScript types generated in {}", out_dir.display());
}
