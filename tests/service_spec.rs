use speculate2::speculate;

speculate! {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use salesdeck::service::{CrmService, Transition};
    use salesdeck::store::{MemoryStore, RecordStore, Stores};
    use salesdeck_core::models::*;
    use salesdeck_core::pipeline::PipelineBoard;
    use salesdeck_core::{CrmError, Result};
    use tokio_test::block_on;

    /// Memory store that counts every call made through it.
    struct CountingStore<R> {
        inner: MemoryStore<R>,
        calls: AtomicUsize,
    }

    impl<R: Record> CountingStore<R> {
        fn new() -> Arc<Self> {
            Arc::new(Self { inner: MemoryStore::new(), calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl<R: Record> RecordStore<R> for CountingStore<R> {
        fn backend_tag(&self) -> &'static str { "counting" }

        async fn get_all(&self) -> Result<Vec<R>> {
            self.hit();
            self.inner.get_all().await
        }

        async fn get_by_id(&self, id: Id) -> Result<Option<R>> {
            self.hit();
            self.inner.get_by_id(id).await
        }

        async fn create(&self, input: R::Create) -> Result<R> {
            self.hit();
            self.inner.create(input).await
        }

        async fn update(&self, id: Id, input: R::Update) -> Result<R> {
            self.hit();
            self.inner.update(id, input).await
        }

        async fn delete(&self, id: Id) -> Result<()> {
            self.hit();
            self.inner.delete(id).await
        }
    }

    /// Store whose backend is always down.
    struct FailingStore;

    #[async_trait]
    impl<R: Record> RecordStore<R> for FailingStore {
        fn backend_tag(&self) -> &'static str { "failing" }

        async fn get_all(&self) -> Result<Vec<R>> {
            Err(CrmError::store("backend unavailable"))
        }

        async fn get_by_id(&self, _id: Id) -> Result<Option<R>> {
            Err(CrmError::store("backend unavailable"))
        }

        async fn create(&self, _input: R::Create) -> Result<R> {
            Err(CrmError::store("backend unavailable"))
        }

        async fn update(&self, _id: Id, _input: R::Update) -> Result<R> {
            Err(CrmError::store("backend unavailable"))
        }

        async fn delete(&self, _id: Id) -> Result<()> {
            Err(CrmError::store("backend unavailable"))
        }
    }

    fn ada() -> CreateContactInput {
        CreateContactInput {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            company: Some("Analytical Engines".into()),
            ..Default::default()
        }
    }

    fn proposal_deal(service: &CrmService, contact_id: Id) -> Deal {
        block_on(service.create_deal(CreateDealInput {
            stage: Stage::Proposal,
            ..CreateDealInput::new("Engine retrofit", 1200.0, contact_id)
        }))
        .expect("create deal")
        .record
    }

    describe "stage transitions" {
        it "makes no store calls when the target is the current stage" {
            let deals = CountingStore::<Deal>::new();
            let activities = CountingStore::<Activity>::new();
            let mut stores = Stores::memory();
            stores.deals = deals.clone();
            stores.activities = activities.clone();
            let service = CrmService::new(stores);

            let deal = proposal_deal(&service, 1);
            let deal_calls = deals.calls();
            let activity_calls = activities.calls();

            let outcome = block_on(service.request_transition(&deal, Stage::Proposal)).unwrap();

            assert!(matches!(outcome, Transition::Unchanged));
            assert_eq!(deals.calls(), deal_calls);
            assert_eq!(activities.calls(), activity_calls);
        }

        it "writes only the stage and then logs the move" {
            let service = CrmService::new(Stores::memory());
            let contact = block_on(service.create_contact(ada())).unwrap().record;
            let deal = proposal_deal(&service, contact.id);

            let outcome = block_on(service.request_transition(&deal, Stage::ClosedWon)).unwrap();
            let Transition::Moved { deal: moved, activity } = outcome else {
                panic!("expected a move");
            };
            assert_eq!(moved.stage, Stage::ClosedWon);
            assert_eq!(moved.title, deal.title);
            assert_eq!(moved.value, deal.value);

            let activity = activity.expect("activity logged");
            assert_eq!(activity.description, "Moved deal to closed-won: Engine retrofit");
            assert_eq!(activity.kind, ActivityType::Deal);
            assert_eq!(activity.contact_id, Some(contact.id));
            assert_eq!(activity.deal_id, Some(deal.id));
        }

        it "allows reopening a closed deal" {
            let service = CrmService::new(Stores::memory());
            let deal = proposal_deal(&service, 1);
            block_on(service.move_deal(deal.id, Stage::ClosedLost)).unwrap();
            let outcome = block_on(service.move_deal(deal.id, Stage::Lead)).unwrap();
            assert!(matches!(outcome, Transition::Moved { deal, .. } if deal.stage == Stage::Lead));
        }

        it "still succeeds when the activity log is down" {
            let mut stores = Stores::memory();
            stores.activities = Arc::new(FailingStore);
            let service = CrmService::new(stores);
            let deal = proposal_deal(&service, 1);

            let outcome = block_on(service.request_transition(&deal, Stage::Negotiation)).unwrap();
            match outcome {
                Transition::Moved { deal, activity } => {
                    assert_eq!(deal.stage, Stage::Negotiation);
                    assert!(activity.is_none());
                }
                Transition::Unchanged => panic!("expected a move"),
            }
            let stored = block_on(service.stores().deals.get_by_id(deal.id)).unwrap().unwrap();
            assert_eq!(stored.stage, Stage::Negotiation);
        }

        it "leaves the board untouched when the update fails" {
            let deal = Deal {
                id: 9,
                title: "Stuck".into(),
                value: 10.0,
                stage: Stage::Lead,
                probability: 25,
                contact_id: 1,
                expected_close_date: None,
                created_at: Utc::now(),
                custom_fields: Default::default(),
            };
            let mut stores = Stores::memory();
            stores.deals = Arc::new(FailingStore);
            let service = CrmService::new(stores);
            let mut board = PipelineBoard::new(vec![deal]);

            let err = block_on(service.move_on_board(&mut board, 9, Stage::Qualified)).unwrap_err();
            assert!(matches!(err, CrmError::Store(_)));
            assert_eq!(board.find(9).unwrap().stage, Stage::Lead);
        }

        it "applies a confirmed move to the board" {
            let service = CrmService::new(Stores::memory());
            let deal = proposal_deal(&service, 1);
            let mut board = block_on(service.load_pipeline()).unwrap().board;

            block_on(service.move_on_board(&mut board, deal.id, Stage::Negotiation)).unwrap();
            let pipeline = board.pipeline();
            assert_eq!(pipeline.column(Stage::Negotiation).unwrap().deal_ids(), vec![deal.id]);
            assert_eq!(pipeline.column(Stage::Proposal).unwrap().count(), 0);
        }
    }

    describe "audited writes" {
        it "logs contact creation and updates" {
            let service = CrmService::new(Stores::memory());
            let created = block_on(service.create_contact(ada())).unwrap();
            let logged = created.activity.unwrap();
            assert_eq!(logged.description, "Created new contact: Ada Lovelace");
            assert_eq!(logged.kind, ActivityType::Contact);
            assert_eq!(logged.contact_id, Some(created.record.id));

            let updated = block_on(service.update_contact(
                created.record.id,
                UpdateContactInput { position: Some(Some("Countess".into())), ..Default::default() },
            ))
            .unwrap();
            assert_eq!(updated.record.position.as_deref(), Some("Countess"));
            assert_eq!(updated.record.company.as_deref(), Some("Analytical Engines"));
            assert_eq!(updated.activity.unwrap().description, "Updated contact: Ada Lovelace");
        }

        it "toggles tasks between completed and pending" {
            let service = CrmService::new(Stores::memory());
            let task = block_on(service.create_task(CreateTaskInput {
                title: "Send proposal".into(),
                deal_id: Some(4),
                ..Default::default()
            }))
            .unwrap();
            assert_eq!(task.activity.as_ref().unwrap().deal_id, Some(4));

            let done = block_on(service.toggle_task(task.record.id)).unwrap();
            assert_eq!(done.record.status, TaskStatus::Completed);
            assert_eq!(done.activity.unwrap().description, "Marked task as completed: Send proposal");

            let reopened = block_on(service.toggle_task(task.record.id)).unwrap();
            assert_eq!(reopened.record.status, TaskStatus::Pending);
        }

        it "rejects invalid input before anything is written" {
            let service = CrmService::new(Stores::memory());
            let err = block_on(service.create_contact(CreateContactInput {
                name: " ".into(),
                email: "not-an-email".into(),
                ..Default::default()
            }))
            .unwrap_err();
            let CrmError::Validation(errors) = err else { panic!("expected validation error") };
            assert_eq!(errors.message_for("name"), Some("Name is required"));
            assert_eq!(errors.message_for("email"), Some("Email is invalid"));
            assert!(block_on(service.stores().activities.get_all()).unwrap().is_empty());
        }

        it "checks custom values against the entity's definitions" {
            let service = CrmService::new(Stores::memory());
            let industry = block_on(service.create_custom_field(CreateCustomFieldInput {
                label: "Industry".into(),
                field_type: FieldType::Select,
                entity: FieldEntity::Contact,
                required: true,
                options: vec!["Retail".into(), "Energy".into()],
                ..Default::default()
            }))
            .unwrap();
            let key = format!("customFields.{}", industry.key());

            let err = block_on(service.create_contact(ada())).unwrap_err();
            let CrmError::Validation(errors) = err else { panic!("expected validation error") };
            assert_eq!(errors.message_for(&key), Some("Industry is required"));

            let mut input = ada();
            input.custom_fields.insert(industry.key(), serde_json::json!("Energy"));
            input.custom_fields.insert("999".into(), serde_json::json!("x"));
            let err = block_on(service.create_contact(input.clone())).unwrap_err();
            assert!(err.is_validation());

            input.custom_fields.remove("999");
            let contact = block_on(service.create_contact(input)).unwrap().record;
            assert_eq!(contact.custom_fields[&industry.key()], "Energy");
        }

        it "does not cascade deletes" {
            let service = CrmService::new(Stores::memory());
            let contact = block_on(service.create_contact(ada())).unwrap().record;
            let deal = proposal_deal(&service, contact.id);
            block_on(service.delete_contact(contact.id)).unwrap();

            let orphan = block_on(service.stores().deals.get_by_id(deal.id)).unwrap().unwrap();
            assert_eq!(orphan.contact_id, contact.id);
            assert!(block_on(service.delete_contact(contact.id)).unwrap_err().is_not_found());
        }
    }

    describe "custom field definitions" {
        it "updates a definition in place" {
            let service = CrmService::new(Stores::memory());
            let source = block_on(service.create_custom_field(CreateCustomFieldInput {
                label: "Source".into(),
                ..Default::default()
            }))
            .unwrap();

            let updated = block_on(service.update_custom_field(source.id, UpdateCustomFieldInput {
                field_type: Some(FieldType::Select),
                required: Some(true),
                options: Some(vec!["Referral".into(), "Web".into()]),
                ..Default::default()
            }))
            .unwrap();
            assert_eq!(updated.id, source.id);
            assert_eq!(updated.label, "Source");
            assert_eq!(updated.field_type, FieldType::Select);
            assert!(updated.required);
            assert_eq!(updated.options, vec!["Referral", "Web"]);

            let fields = block_on(service.custom_fields(FieldEntity::Contact)).unwrap();
            assert_eq!(fields, vec![updated]);
        }

        it "never leaves a select field without options" {
            let service = CrmService::new(Stores::memory());
            let text = block_on(service.create_custom_field(CreateCustomFieldInput {
                label: "Notes".into(),
                ..Default::default()
            }))
            .unwrap();
            let err = block_on(service.update_custom_field(text.id, UpdateCustomFieldInput {
                field_type: Some(FieldType::Select),
                ..Default::default()
            }))
            .unwrap_err();
            assert!(err.is_validation());

            let tier = block_on(service.create_custom_field(CreateCustomFieldInput {
                label: "Tier".into(),
                field_type: FieldType::Select,
                options: vec!["Gold".into()],
                ..Default::default()
            }))
            .unwrap();
            let err = block_on(service.update_custom_field(tier.id, UpdateCustomFieldInput {
                options: Some(vec![]),
                ..Default::default()
            }))
            .unwrap_err();
            assert!(err.is_validation());

            let fields = block_on(service.custom_fields(FieldEntity::Contact)).unwrap();
            assert_eq!(fields, vec![text, tier]);
        }

        it "reports unknown definitions as not found" {
            let service = CrmService::new(Stores::memory());
            let err = block_on(service.update_custom_field(42, UpdateCustomFieldInput {
                label: Some("Gone".into()),
                ..Default::default()
            }))
            .unwrap_err();
            assert!(err.is_not_found());
        }
    }

    describe "joined loads" {
        it "summarizes every collection" {
            let service = CrmService::new(Stores::memory());
            let contact = block_on(service.create_contact(ada())).unwrap().record;
            proposal_deal(&service, contact.id);
            let won = proposal_deal(&service, contact.id);
            block_on(service.move_deal(won.id, Stage::ClosedWon)).unwrap();
            block_on(service.create_task(CreateTaskInput {
                title: "Call back".into(),
                due_date: Some(Utc::now()),
                ..Default::default()
            }))
            .unwrap();

            let dash = block_on(service.load_dashboard(Utc::now())).unwrap();
            assert_eq!(dash.stats.total_contacts, 1);
            assert_eq!(dash.stats.total_deals, 2);
            assert_eq!(dash.stats.total_value, 2400.0);
            assert_eq!(dash.stats.win_rate, 50);
            assert_eq!(dash.stats.active_tasks, 1);
            assert_eq!(dash.todays_tasks.len(), 1);
            assert_eq!(dash.recent_activities.len(), 5);
            assert_eq!(
                dash.recent_activities[0].description,
                "Created new task: Call back"
            );
        }

        it "fails as a whole when one collection fails" {
            let mut stores = Stores::memory();
            stores.tasks = Arc::new(FailingStore);
            let service = CrmService::new(stores);
            block_on(service.create_contact(ada())).unwrap();

            let err = block_on(service.load_dashboard(Utc::now())).unwrap_err();
            assert!(matches!(err, CrmError::Store(ref msg) if msg == "backend unavailable"));
        }

        it "gathers a contact's related records" {
            let service = CrmService::new(Stores::memory());
            let ada = block_on(service.create_contact(ada())).unwrap().record;
            let other = block_on(service.create_contact(CreateContactInput {
                name: "Charles".into(),
                email: "charles@example.com".into(),
                ..Default::default()
            }))
            .unwrap()
            .record;
            let deal = proposal_deal(&service, ada.id);
            proposal_deal(&service, other.id);

            let overview = block_on(service.contact_overview(ada.id)).unwrap();
            assert_eq!(overview.contact.id, ada.id);
            assert_eq!(overview.deals.iter().map(|d| d.id).collect::<Vec<_>>(), vec![deal.id]);
            assert_eq!(overview.activities.len(), 2);

            let missing = block_on(service.contact_overview(404)).unwrap_err();
            assert!(missing.is_not_found());
        }

        it "groups the activity view by day" {
            let service = CrmService::new(Stores::memory());
            let now = Utc::now();
            for (days_ago, text) in [(0, "today"), (1, "yesterday"), (3, "earlier")] {
                block_on(service.stores().activities.create(
                    CreateActivityInput::new(ActivityType::Note, text).at(now - Duration::days(days_ago)),
                ))
                .unwrap();
            }
            let list = block_on(service.activity_list(&Default::default(), now)).unwrap();
            let labels: Vec<&str> = list.groups.iter().map(|g| g.label.as_str()).collect();
            assert_eq!(labels[..2], ["Today", "Yesterday"]);
            assert_eq!(list.groups.len(), 3);
            assert_eq!(list.stats.last_7_days, 3);
        }
    }
}
