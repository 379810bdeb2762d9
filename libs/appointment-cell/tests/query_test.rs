mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentPage, AppointmentStatus, ListFilter, PageRequest};
use shared_models::auth::Actor;

use common::{monday, patient, t, tuesday, Harness};

#[tokio::test]
async fn test_each_role_sees_only_its_own_appointments() {
    let h = Harness::new().await;
    let alice = patient();
    let bob = patient();

    h.book(&alice, monday(), t(9, 0)).await.unwrap();
    h.book(&alice, tuesday(), t(9, 0)).await.unwrap();
    h.book(&bob, monday(), t(10, 0)).await.unwrap();

    let alice_page = h.queries.list(&alice, ListFilter::PendingForMe, PageRequest::default()).await.unwrap();
    assert_eq!(alice_page.total, 2);
    assert!(alice_page.appointments.iter().all(|a| a.subject_id == alice.id));
    // Most recent first
    assert_eq!(alice_page.appointments[0].date, tuesday());

    let doctor_page = h.queries.list(&h.doctor, ListFilter::PendingForMe, PageRequest::default()).await.unwrap();
    assert_eq!(doctor_page.total, 3);

    let stranger = Actor::practitioner(Uuid::new_v4());
    let empty = h.queries.list(&stranger, ListFilter::PendingForMe, PageRequest::default()).await.unwrap();
    assert_eq!(empty.total, 0);
    assert!(empty.appointments.is_empty());
}

async fn list(h: &Harness, actor: &Actor, filter: ListFilter) -> AppointmentPage {
    h.queries.list(actor, filter, PageRequest::default()).await.unwrap()
}

#[tokio::test]
async fn test_filters_follow_status_and_time() {
    let h = Harness::new().await;
    let alice = patient();

    let done = h.confirmed(&alice, monday(), t(9, 0)).await;
    let upcoming = h.confirmed(&alice, tuesday(), t(11, 0)).await;
    let cancelled = h.book(&alice, tuesday(), t(9, 0)).await.unwrap();
    h.booking.cancel(cancelled.id, &alice).await.unwrap();

    h.clock.set(monday().and_hms_opt(12, 0, 0).unwrap());
    h.booking.complete(done.id, &h.doctor).await.unwrap();

    let upcoming_page = list(&h, &alice, ListFilter::UpcomingConfirmed).await;
    assert_eq!(upcoming_page.appointments.iter().map(|a| a.id).collect::<Vec<_>>(), vec![upcoming.id]);

    let history = list(&h, &alice, ListFilter::History).await;
    assert_eq!(history.total, 1);
    assert_eq!(history.appointments[0].id, done.id);
    assert_eq!(history.appointments[0].status, AppointmentStatus::Completed);

    let cancelled_page = list(&h, &alice, ListFilter::Cancelled).await;
    assert_eq!(cancelled_page.appointments[0].id, cancelled.id);

    // Once it has ended, a confirmed appointment moves from upcoming to history
    h.clock.set(tuesday().and_hms_opt(11, 30, 0).unwrap());
    assert_eq!(list(&h, &alice, ListFilter::UpcomingConfirmed).await.total, 0);
    assert_eq!(list(&h, &alice, ListFilter::History).await.total, 2);
}

#[tokio::test]
async fn test_pages_are_stable_slices() {
    let h = Harness::new().await;
    for offset in 0..6 {
        h.book(&patient(), monday(), t(9, 0) + Duration::minutes(30 * offset)).await.unwrap();
    }

    let first = h.queries.list(&h.doctor, ListFilter::PendingForMe, PageRequest::new(Some(4), None)).await.unwrap();
    let second = h
        .queries
        .list(&h.doctor, ListFilter::PendingForMe, PageRequest::new(Some(4), Some(4)))
        .await
        .unwrap();

    assert_eq!(first.total, 6);
    assert_eq!(first.appointments.len(), 4);
    assert_eq!(second.appointments.len(), 2);
    assert_eq!(second.offset, 4);
    assert_eq!(first.appointments[0].start_time, t(11, 30));
    assert_eq!(second.appointments[1].start_time, t(9, 0));

    let beyond = h
        .queries
        .list(&h.doctor, ListFilter::PendingForMe, PageRequest::new(Some(4), Some(40)))
        .await
        .unwrap();
    assert!(beyond.appointments.is_empty());
    assert_eq!(beyond.total, 6);
}

#[tokio::test]
async fn test_get_is_limited_to_participants_and_admins() {
    let h = Harness::new().await;
    let alice = patient();
    let booked = h.book(&alice, monday(), t(9, 0)).await.unwrap();

    assert_eq!(h.queries.get(booked.id, &alice).await.unwrap().id, booked.id);
    assert_eq!(h.queries.get(booked.id, &h.doctor).await.unwrap().id, booked.id);
    assert!(h.queries.get(booked.id, &Actor::admin(Uuid::new_v4())).await.is_ok());

    assert_matches!(h.queries.get(booked.id, &patient()).await, Err(AppointmentError::Forbidden(_)));
    assert_matches!(
        h.queries.get(booked.id, &Actor::practitioner(Uuid::new_v4())).await,
        Err(AppointmentError::Forbidden(_))
    );
    assert_matches!(h.queries.get(Uuid::new_v4(), &alice).await, Err(AppointmentError::NotFound(_)));
}

#[tokio::test]
async fn test_export_is_admin_only_and_ordered() {
    let h = Harness::new().await;
    h.book(&patient(), tuesday(), t(9, 0)).await.unwrap();
    h.book(&patient(), monday(), t(11, 0)).await.unwrap();
    let cancelled = h.book(&patient(), monday(), t(9, 0)).await.unwrap();
    h.booking.cancel(cancelled.id, &h.doctor).await.unwrap();

    let admin = Actor::admin(Uuid::new_v4());
    let exported = h.queries.export(&admin).await.unwrap();
    let keys: Vec<_> = exported.iter().map(|a| (a.date, a.start_time)).collect();
    assert_eq!(keys, vec![(monday(), t(9, 0)), (monday(), t(11, 0)), (tuesday(), t(9, 0))]);
    assert_eq!(exported[0].status, AppointmentStatus::Cancelled);

    assert_matches!(h.queries.export(&patient()).await, Err(AppointmentError::Forbidden(_)));
    assert_matches!(h.queries.export(&h.doctor).await, Err(AppointmentError::Forbidden(_)));
}
