//! Quota conservation under concurrent gives.

#![allow(clippy::panic)]

mod common;

use std::sync::Arc;

use common::{World, at, date, week_draft};
use readalong_gateway::config::EngineSettings;
use readalong_gateway::domain::{EnrollmentType, UserId};
use readalong_gateway::error::GatewayError;
use readalong_gateway::service::{GiveOutcome, GiveRequest};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_gives_never_overspend_the_daily_quota() {
    let settings = EngineSettings {
        default_daily_quota: 10,
        ..EngineSettings::default()
    };
    let world = World::new(settings);
    let event_id = world.approved(week_draft(10)).await;

    let giver = UserId::new();
    let mut readers = Vec::new();
    for _ in 0..6 {
        readers.push(UserId::new());
    }
    for user in readers.iter().copied().chain([giver]) {
        let Ok(_) = world
            .engine
            .enrollments
            .enroll(event_id, user, EnrollmentType::Participant)
            .await
        else {
            panic!("enrollment failed");
        };
    }

    let d0 = date(2026, 3, 2);
    world.clock.set(at(d0, 8));
    let Ok(true) = world.engine.lifecycle.start(event_id).await else {
        panic!("event should start");
    };
    let mut targets = Vec::new();
    for reader in &readers {
        targets.push(world.check_in(event_id, *reader, d0).await);
    }

    let engine = Arc::new(world.engine);
    let mut tasks = Vec::new();
    for i in 0..30_u32 {
        let engine = Arc::clone(&engine);
        let Some(target) = targets.get(usize::try_from(i).unwrap_or(0) % targets.len()).cloned()
        else {
            panic!("no target");
        };
        let amount = i % 3 + 1;
        tasks.push(tokio::spawn(async move {
            let outcome = engine
                .rewards
                .give(GiveRequest {
                    event_id,
                    giver_id: giver,
                    recipient_id: target.user_id,
                    target_id: target.id,
                    amount,
                    comment: None,
                    anonymous: false,
                    confirmed: true,
                })
                .await;
            match outcome {
                Ok(GiveOutcome::Given(receipt)) => Some(receipt.reward.amount),
                Ok(GiveOutcome::Preview(_)) => panic!("confirmed give returned a preview"),
                Err(GatewayError::InsufficientQuota { .. } | GatewayError::ConcurrencyConflict(_)) => {
                    None
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }));
    }

    let mut spent = 0_u32;
    for task in tasks {
        let Ok(result) = task.await else {
            panic!("give task panicked");
        };
        spent += result.unwrap_or(0);
    }

    let Ok(report) = engine.rewards.quota_status(event_id, giver, d0).await else {
        panic!("quota status failed");
    };
    assert!(report.quota.used <= 10);
    assert_eq!(report.quota.used, spent);
    let logged: u32 = report.rewards_given.iter().map(|r| r.amount).sum();
    assert_eq!(logged, spent);
    assert_eq!(report.quota.remaining, 10 - spent);
}
