mod common;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use serde_json::json;

use coach_crm::filter::FilterData;
use coach_crm::hooks::{LeadHooks, MeetingHooks, NotificationHooks, SavedViewHooks};
use coach_crm::models::{FormSubmission, LeadStatus};
use coach_crm::remote::{MemoryStore, RemoteOp};

#[tokio::test]
async fn lead_moves_through_the_workflow() -> Result<()> {
    let store = MemoryStore::new();
    store
        .seed("leads", vec![json!({ "id": "L1", "full_name": "Dana Cohen", "status": LeadStatus::NEW })])
        .await?;
    let (ctx, _) = common::memory_hooks(&store);
    let leads = LeadHooks::new(ctx);

    assert_eq!(leads.by_status(LeadStatus::NEW).await?.len(), 1);
    leads.update_status("L1", LeadStatus::MEETING_SET).await?;

    assert!(leads.by_status(LeadStatus::NEW).await?.is_empty());
    let booked = leads.by_status(LeadStatus::MEETING_SET).await?;
    assert_eq!(booked[0].full_name.as_deref(), Some("Dana Cohen"));

    let calls = store.total_calls().await;
    assert!(leads.update_status("L1", "   ").await.unwrap_err().is_validation());
    assert_eq!(store.total_calls().await, calls);
    Ok(())
}

#[tokio::test]
async fn form_submission_becomes_a_new_lead() -> Result<()> {
    let store = MemoryStore::new();
    let (ctx, _) = common::memory_hooks(&store);
    let leads = LeadHooks::new(ctx);

    let submission = FormSubmission::from_json(
        r#"{
            "formId": "landing-spring",
            "submissionId": "S-77",
            "submissionTime": "2024-03-01T09:00:00Z",
            "urlParameters": [
                { "name": "full_name", "value": "Michal Katz" },
                { "name": "phone", "value": "053-3333333" },
                { "name": "utm_source", "value": "instagram" }
            ]
        }"#,
    )?;
    let lead = leads.ingest(&submission).await?;
    assert_eq!(lead.status, LeadStatus::NEW);

    let stored = store.rows("leads").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["source"], "instagram");
    assert_eq!(stored[0]["phone"], "053-3333333");
    Ok(())
}

#[tokio::test]
async fn notifications_count_and_mark_read() -> Result<()> {
    let store = MemoryStore::new();
    store
        .seed(
            "notifications",
            vec![
                json!({ "id": "N1", "user_id": "coach-1", "title": "New lead", "is_read": false }),
                json!({ "id": "N2", "user_id": "coach-1", "title": "Meeting moved", "is_read": false }),
                json!({ "id": "N3", "user_id": "coach-1", "title": "Old", "is_read": true }),
                json!({ "id": "N4", "user_id": "coach-2", "title": "Other coach", "is_read": false }),
            ],
        )
        .await?;
    let (ctx, _) = common::memory_hooks(&store);
    let notifications = NotificationHooks::new(ctx);

    assert_eq!(notifications.unread_count("coach-1").await?, 2);
    assert!(notifications.mark_read("N1").await?.is_read);
    assert_eq!(notifications.unread_count("coach-1").await?, 1);

    assert_eq!(notifications.mark_all_read("coach-1").await?, 1);
    assert_eq!(notifications.unread_count("coach-1").await?, 0);
    assert_eq!(notifications.unread_count("coach-2").await?, 1);
    Ok(())
}

#[tokio::test]
async fn saving_a_view_twice_overwrites_it() -> Result<()> {
    let store = MemoryStore::new();
    let (ctx, _) = common::memory_hooks(&store);
    let views = SavedViewHooks::new(ctx);

    let hot = FilterData::where_eq("status", LeadStatus::IN_PROGRESS);
    let first = views.save_view("leads", "Hot leads", hot, vec!["full_name".into()]).await?;

    let booked = FilterData::where_eq("status", LeadStatus::MEETING_SET);
    let second = views
        .save_view("leads", "Hot leads", booked.clone(), vec!["full_name".into(), "phone".into()])
        .await?;
    assert_eq!(first.id, second.id);
    assert_eq!(second.filter, booked);
    assert_eq!(store.calls(RemoteOp::Insert).await, 1);

    let listed = views.views_for("leads").await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].columns, vec!["full_name", "phone"]);

    let bad = FilterData::where_eq("status; drop", 1);
    assert!(views.save_view("leads", "Broken", bad, vec![]).await.unwrap_err().is_validation());
    assert!(views.save_view("leads", " ", FilterData::default(), vec![]).await.unwrap_err().is_validation());

    views.delete_view(&first.id).await?;
    assert!(views.views_for("leads").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn meetings_in_a_window() -> Result<()> {
    let store = MemoryStore::new();
    store
        .seed(
            "meetings",
            vec![
                json!({ "id": "M1", "customer_id": "C1", "start_time": "2024-05-05T08:00:00Z" }),
                json!({ "id": "M2", "customer_id": "C2", "start_time": "2024-05-06T16:30:00Z" }),
                json!({ "id": "M3", "customer_id": "C1", "start_time": "2024-05-12T08:00:00Z" }),
            ],
        )
        .await?;
    let (ctx, _) = common::memory_hooks(&store);
    let meetings = MeetingHooks::new(ctx);

    let from = Utc.with_ymd_and_hms(2024, 5, 5, 0, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2024, 5, 12, 0, 0, 0).unwrap();
    let week: Vec<String> = meetings.between(from, to).await?.into_iter().map(|m| m.id).collect();
    assert_eq!(week, vec!["M1", "M2"]);

    assert!(meetings.between(to, from).await.unwrap_err().is_validation());
    assert_eq!(meetings.for_customer("C1").await?.len(), 2);
    Ok(())
}
