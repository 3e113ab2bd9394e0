// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end flows through the same pieces the CLI commands wire together.
//!
//! Each test builds an isolated ChatHarness over the mock backend. Tests are
//! independent and order-insensitive.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use haven_chat::{Composer, RoleFilter, SendOutcome};
use haven_core::{Role, UserId};
use haven_session::CurrentUser;
use haven_test_utils::{ChatHarness, wait_for_len};

// ---- Login -> partners -> chat ----

#[tokio::test]
async fn family_member_logs_in_and_messages_staff() {
    let harness = ChatHarness::builder()
        .with_named_profile("fam-1", Some(Role::Family), "Kim")
        .with_named_profile("staff-1", Some(Role::Staff), "Sam")
        .with_named_profile("admin-1", Some(Role::Admin), "Ari")
        .with_family("family-9", "fam-1", &[("res-1", "Ada Lee")])
        .build()
        .await;
    harness
        .backend
        .add_user("fam-1@haven.test", "pw", "fam-1")
        .await;

    // haven login
    let coordinator = harness.coordinator();
    coordinator.sign_in("fam-1@haven.test", "pw").await.unwrap();

    // haven session
    let me = CurrentUser::resolve(&coordinator, harness.backend.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(me.is_family());

    // haven partners
    let partners = harness.directory().partners(me.id()).await.unwrap();
    let staff: Vec<&str> = RoleFilter::Only(Role::Staff)
        .apply(&partners)
        .iter()
        .map(|p| p.id.as_str())
        .collect();
    assert_eq!(staff, ["staff-1"]);
    assert!(partners.iter().any(|p| p.is_resident && p.name == "Ada Lee"));
    assert!(!partners.iter().any(|p| p.id.as_str() == "admin-1"));

    // haven chat --with staff-1
    let mut view = harness.view(me.id().as_str());
    view.open(UserId::from("staff-1")).await.unwrap();
    let mut log = view.watch().unwrap();

    let mut composer = Composer::new();
    composer.set_draft("Is Ada eating well?");
    assert_eq!(composer.submit_to(&view).await.unwrap(), SendOutcome::Sent);
    assert_eq!(composer.draft(), "");

    let shown = wait_for_len(&mut log, 1).await.unwrap();
    assert_eq!(shown[0].body, "Is Ada eating well?");
    assert_eq!(shown[0].sender.as_str(), "fam-1");

    view.close().await;
    assert_eq!(harness.backend.open_channel_count().await, 0);
}

// ---- Two clients, one conversation ----

#[tokio::test]
async fn both_participants_see_each_message_once() {
    let harness = ChatHarness::builder()
        .with_profile("fam-1", Role::Family)
        .with_profile("staff-1", Role::Staff)
        .build()
        .await;
    harness.backend.seed_message("staff-1", "fam-1", "Welcome").await;

    let mut family_view = harness.view("fam-1");
    family_view.open(UserId::from("staff-1")).await.unwrap();
    let mut staff_view = harness.view("staff-1");
    staff_view.open(UserId::from("fam-1")).await.unwrap();

    let mut family_log = family_view.watch().unwrap();
    let mut staff_log = staff_view.watch().unwrap();
    assert_eq!(wait_for_len(&mut family_log, 1).await.unwrap()[0].body, "Welcome");

    family_view.send("Thank you").await.unwrap();
    staff_view.send("Any time").await.unwrap();

    let family_sees = wait_for_len(&mut family_log, 3).await.unwrap();
    let staff_sees = wait_for_len(&mut staff_log, 3).await.unwrap();
    assert_eq!(family_sees, staff_sees);
    assert_eq!(family_sees.len(), 3);

    family_view.close().await;
    staff_view.close().await;
}

// ---- Session persistence hook ----

#[tokio::test]
async fn session_listener_sees_login_and_logout() {
    let harness = ChatHarness::builder().build().await;
    harness
        .backend
        .add_user("staff-1@haven.test", "pw", "staff-1")
        .await;
    let coordinator = harness.coordinator();

    let saves = Arc::new(AtomicUsize::new(0));
    let removals = Arc::new(AtomicUsize::new(0));
    let _handle = {
        let (saves, removals) = (saves.clone(), removals.clone());
        coordinator.add_listener(move |session| {
            if session.is_some() {
                saves.fetch_add(1, Ordering::SeqCst);
            } else {
                removals.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    coordinator.sign_in("staff-1@haven.test", "pw").await.unwrap();
    coordinator.sign_out().await.unwrap();

    assert_eq!(saves.load(Ordering::SeqCst), 1);
    assert_eq!(removals.load(Ordering::SeqCst), 1);
    assert!(coordinator.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn wrong_password_leaves_client_signed_out() {
    let harness = ChatHarness::builder().build().await;
    harness
        .backend
        .add_user("staff-1@haven.test", "pw", "staff-1")
        .await;
    let coordinator = harness.coordinator();

    assert!(coordinator.sign_in("staff-1@haven.test", "nope").await.is_err());
    assert!(coordinator.current().is_none());
    assert!(
        CurrentUser::resolve(&coordinator, harness.backend.as_ref())
            .await
            .unwrap()
            .is_none()
    );
}
