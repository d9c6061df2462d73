//! Integration tests for the reminder engine.
//!
//! These tests drive confirmation, lifetime renewal and deletion through
//! [`ReminderEngine`] against the in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use tokio::runtime::Handle;

use dose_core::storage::EngineConfig;
use dose_core::{
    DeleteOutcome, DispatchError, InMemoryStore, MedicationDefinition, MedicationOccurrence,
    MedicationStore, MedicationType, NotificationDispatcher, OccurrenceId, Recurrence,
    ReminderEngine, ReminderEvent,
};

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Default)]
struct MockDispatcher {
    scheduled: Mutex<Vec<(OccurrenceId, DateTime<Utc>)>>,
    cancelled: Mutex<Vec<OccurrenceId>>,
}

impl MockDispatcher {
    fn scheduled(&self) -> Vec<(OccurrenceId, DateTime<Utc>)> {
        self.scheduled.lock().unwrap().clone()
    }

    fn cancelled(&self) -> Vec<OccurrenceId> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for MockDispatcher {
    async fn schedule(&self, occurrence: &MedicationOccurrence) -> Result<(), DispatchError> {
        self.scheduled
            .lock()
            .unwrap()
            .push((occurrence.id, occurrence.medication_time));
        Ok(())
    }

    async fn cancel(&self, id: OccurrenceId) -> Result<(), DispatchError> {
        self.cancelled.lock().unwrap().push(id);
        Ok(())
    }
}

fn day0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
}

fn setup() -> (Arc<InMemoryStore>, Arc<MockDispatcher>, ReminderEngine) {
    let store = Arc::new(InMemoryStore::new());
    let dispatcher = Arc::new(MockDispatcher::default());
    let engine = ReminderEngine::new(
        store.clone(),
        dispatcher.clone(),
        &EngineConfig::default(),
        Handle::current(),
    );
    (store, dispatcher, engine)
}

fn vitamin_d(medication_time: DateTime<Utc>) -> MedicationOccurrence {
    MedicationOccurrence {
        id: 0,
        name: "Vitamin D".to_string(),
        dosage: 1000,
        frequency: "daily".to_string(),
        medication_type: MedicationType::Capsule,
        start_date: day0(),
        end_date: None,
        medication_time,
        taken: false,
    }
}

/// 95 doses, four a day, of a bounded course.
fn bounded_course() -> Vec<MedicationOccurrence> {
    (0..95)
        .map(|i| MedicationOccurrence {
            id: 0,
            name: "Ibuprofen".to_string(),
            dosage: 200,
            frequency: "every 6 hours".to_string(),
            medication_type: MedicationType::Tablet,
            start_date: day0(),
            end_date: Some(day0() + Duration::days(24)),
            medication_time: day0() + Duration::hours(6 * i),
            taken: false,
        })
        .collect()
}

// ============================================================================
// Confirmation
// ============================================================================

#[tokio::test]
async fn test_confirm_caps_dispatch_but_stores_everything() {
    let (store, dispatcher, engine) = setup();
    let mut events = engine.subscribe();

    let report = engine.confirm(bounded_course()).await.unwrap();

    assert_eq!(store.list_all().await.unwrap().len(), 95);
    assert_eq!(dispatcher.scheduled().len(), 90);
    assert_eq!(report.scheduled, 90);
    assert_eq!(report.unscheduled, 5);
    assert!(report.persisted.iter().all(|o| o.id > 0));

    let event = events.recv().await.unwrap();
    assert!(matches!(
        event,
        ReminderEvent::MedicationSaved {
            persisted: 95,
            scheduled: 90,
            unscheduled: 5,
            dispatch_failures: 0,
            ..
        }
    ));
}

#[tokio::test]
async fn test_confirm_definition_weekly_course() {
    let (_, dispatcher, engine) = setup();
    let definition = MedicationDefinition {
        name: "Methotrexate".to_string(),
        dosage: 10,
        frequency: "weekly".to_string(),
        medication_type: MedicationType::Tablet,
        start_date: day0(),
        end_date: Some(day0() + Duration::days(27)),
        recurrence: Recurrence::Weekly {
            days: vec![day0().weekday()],
        },
        times_of_day: vec![NaiveTime::from_hms_opt(9, 0, 0).unwrap()],
    };

    let report = engine.confirm_definition(&definition).await.unwrap();

    let times: Vec<_> = report.persisted.iter().map(|o| o.medication_time).collect();
    assert_eq!(
        times,
        (0..4).map(|w| day0() + Duration::weeks(w)).collect::<Vec<_>>()
    );
    assert_eq!(dispatcher.scheduled().len(), 4);
}

// ============================================================================
// Lifetime renewal
// ============================================================================

#[tokio::test]
async fn test_vitamin_d_renews_ninety_days_out() {
    let (store, dispatcher, engine) = setup();
    let report = engine.confirm(vec![vitamin_d(day0())]).await.unwrap();
    let fired = report.persisted[0].clone();

    engine
        .on_notification_delivered(fired.clone())
        .expect("lifetime medications renew")
        .await
        .unwrap();

    let all = store.list_all().await.unwrap();
    assert_eq!(all.len(), 2);
    let renewed = all.iter().find(|o| o.id != fired.id).unwrap();
    assert_eq!(renewed.medication_time, day0() + Duration::days(90));
    assert!(!renewed.taken);
    assert!(renewed.end_date.is_none());
    assert!(renewed.id > fired.id);
    assert_eq!(dispatcher.scheduled().last(), Some(&(renewed.id, renewed.medication_time)));
}

#[tokio::test]
async fn test_sequential_deliveries_chain_renewals() {
    let (store, _, engine) = setup();
    let mut events = engine.subscribe();
    let mut fired = engine
        .confirm(vec![vitamin_d(day0())])
        .await
        .unwrap()
        .persisted
        .remove(0);
    let _ = events.recv().await;

    const DELIVERIES: i64 = 4;
    for _ in 0..DELIVERIES {
        engine
            .on_notification_delivered(fired.clone())
            .unwrap()
            .await
            .unwrap();
        let next_id = match events.recv().await.unwrap() {
            ReminderEvent::RenewalCreated {
                previous_id,
                occurrence_id,
                ..
            } => {
                assert_eq!(previous_id, fired.id);
                occurrence_id
            }
            other => panic!("unexpected event: {other:?}"),
        };
        fired = store.get(next_id).await.unwrap().unwrap();
    }

    let mut times: Vec<_> = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|o| {
            assert!(!o.taken);
            o.medication_time
        })
        .collect();
    times.sort();
    assert_eq!(times.len() as i64, DELIVERIES + 1);
    for pair in times.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::days(90));
    }
}

#[tokio::test]
async fn test_bounded_delivery_creates_nothing() {
    let (store, _, engine) = setup();
    let report = engine.confirm(bounded_course()).await.unwrap();
    assert!(engine
        .on_notification_delivered(report.persisted[0].clone())
        .is_none());
    assert_eq!(store.list_all().await.unwrap().len(), 95);
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_deleting_upcoming_dose_removes_rest_of_series() {
    let (store, dispatcher, engine) = setup();
    // Anchor the series in the past so day 0 is history and days 5 and 10
    // are still ahead.
    let start = Utc::now() - Duration::days(3);
    let dose = |days: i64| MedicationOccurrence {
        start_date: start,
        medication_time: start + Duration::days(days),
        ..vitamin_d(start)
    };
    let saved = engine
        .confirm(vec![dose(0), dose(5), dose(10)])
        .await
        .unwrap()
        .persisted;
    engine.mark_taken(saved[0].id, true).await.unwrap();

    let outcome = engine.delete_medication(&saved[1]).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Future { removed: 2 });
    let left = store.list_all().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, saved[0].id);
    assert!(left[0].taken);
    assert_eq!(dispatcher.cancelled(), vec![saved[1].id, saved[2].id]);
}

#[tokio::test]
async fn test_deleting_past_dose_leaves_future_alone() {
    let (store, _, engine) = setup();
    let start = Utc::now() - Duration::days(3);
    let dose = |days: i64| MedicationOccurrence {
        start_date: start,
        medication_time: start + Duration::days(days),
        ..vitamin_d(start)
    };
    let saved = engine
        .confirm(vec![dose(0), dose(5)])
        .await
        .unwrap()
        .persisted;

    let outcome = engine.delete_medication(&saved[0]).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Single { id: saved[0].id });
    let left: Vec<_> = store.list_all().await.unwrap().iter().map(|o| o.id).collect();
    assert_eq!(left, vec![saved[1].id]);
}

#[tokio::test]
async fn test_delete_future_leaves_other_series_untouched() {
    let (store, _, engine) = setup();
    let start = Utc::now() + Duration::days(1);
    let vitamin = MedicationOccurrence {
        start_date: start,
        ..vitamin_d(start)
    };
    let other = MedicationOccurrence {
        name: "Magnesium".to_string(),
        ..vitamin.clone()
    };
    engine.confirm(vec![vitamin.clone(), other]).await.unwrap();

    let removed = engine.delete_future_medication_doses(&vitamin).await.unwrap();

    assert_eq!(removed, 1);
    let left = store.list_all().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].name, "Magnesium");
}
