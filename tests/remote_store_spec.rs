use speculate2::speculate;

speculate! {
    use salesdeck::api;
    use salesdeck::service::{CrmService, Transition};
    use salesdeck::store::{RecordStore, RemoteStore, Stores};
    use salesdeck_core::models::*;
    use salesdeck_core::{CrmError, Database};
    use tokio::net::TcpListener;
    use tokio_test::block_on;

    /// Serve an in-memory backend on a free local port and return its URL.
    async fn spawn_backend() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, api::create_router(Stores::memory()))
                .await
                .unwrap();
        });
        format!("http://{}", addr)
    }

    fn grace() -> CreateContactInput {
        CreateContactInput {
            name: "Grace Hopper".into(),
            email: "grace@example.com".into(),
            tags: vec!["navy".into(), "cobol".into()],
            ..Default::default()
        }
    }

    describe "remote store" {
        it "round-trips records through the backend" {
            block_on(async {
                let base = spawn_backend().await;
                let store = RemoteStore::<Contact>::new(&base).unwrap();

                let created = store.create(grace()).await.unwrap();
                assert_eq!(created.id, 1);
                assert_eq!(created.tags, vec!["navy", "cobol"]);

                let updated = store
                    .update(created.id, UpdateContactInput {
                        phone: Some(Some("555-0100".into())),
                        ..Default::default()
                    })
                    .await
                    .unwrap();
                assert_eq!(updated.phone.as_deref(), Some("555-0100"));
                assert_eq!(updated.name, "Grace Hopper");

                let cleared = store
                    .update(created.id, UpdateContactInput {
                        phone: Some(None),
                        ..Default::default()
                    })
                    .await
                    .unwrap();
                assert_eq!(cleared.phone, None);

                let all = store.get_all().await.unwrap();
                assert_eq!(all, vec![cleared]);
            });
        }

        it "maps backend errors onto the error taxonomy" {
            block_on(async {
                let base = spawn_backend().await;
                let store = RemoteStore::<Deal>::new(&base).unwrap();

                assert!(store.get_by_id(7).await.unwrap().is_none());

                let err = store.delete(7).await.unwrap_err();
                assert!(matches!(err, CrmError::NotFound { id: 7, .. }));

                let err = store
                    .create(CreateDealInput::new("", 10.0, 1))
                    .await
                    .unwrap_err();
                let CrmError::Validation(errors) = err else { panic!("expected validation error") };
                assert_eq!(errors.message_for("title"), Some("Deal title is required"));
            });
        }

        it "reports an unreachable backend as a store fault" {
            block_on(async {
                let store = RemoteStore::<Task>::new("http://127.0.0.1:9").unwrap();
                let err = store.get_all().await.unwrap_err();
                assert!(matches!(err, CrmError::Store(_)));
            });
        }

        it "drives the service end to end" {
            block_on(async {
                let base = spawn_backend().await;
                let service = CrmService::new(Stores::remote(&base).unwrap());
                assert_eq!(service.stores().backend_tag(), "remote");

                let contact = service.create_contact(grace()).await.unwrap().record;
                let deal = service
                    .create_deal(CreateDealInput::new("Compiler", 900.0, contact.id))
                    .await
                    .unwrap()
                    .record;

                let outcome = service.move_deal(deal.id, Stage::Negotiation).await.unwrap();
                let Transition::Moved { activity, .. } = outcome else {
                    panic!("expected a move");
                };
                assert_eq!(
                    activity.unwrap().description,
                    "Moved deal to negotiation: Compiler"
                );

                let overview = service.contact_overview(contact.id).await.unwrap();
                assert_eq!(overview.deals[0].stage, Stage::Negotiation);
                assert_eq!(overview.activities.len(), 3);
            });
        }

        it "serves custom fields per entity" {
            block_on(async {
                let base = spawn_backend().await;
                let service = CrmService::new(Stores::remote(&base).unwrap());
                service
                    .create_custom_field(CreateCustomFieldInput {
                        label: "Renewal".into(),
                        field_type: FieldType::Date,
                        entity: FieldEntity::Deal,
                        ..Default::default()
                    })
                    .await
                    .unwrap();

                assert!(service.custom_fields(FieldEntity::Contact).await.unwrap().is_empty());
                let deal_fields = service.custom_fields(FieldEntity::Deal).await.unwrap();
                assert_eq!(deal_fields.len(), 1);
                assert_eq!(deal_fields[0].label, "Renewal");
                assert!(!deal_fields[0].required);
            });
        }
    }

    describe "sqlite store" {
        it "keeps records across reopening the file" {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("crm.db");

            block_on(async {
                let db = Database::open(&path).unwrap();
                db.migrate().unwrap();
                let service = CrmService::new(Stores::sqlite(db));
                let task = service
                    .create_task(CreateTaskInput {
                        title: "Follow up".into(),
                        priority: Priority::High,
                        ..Default::default()
                    })
                    .await
                    .unwrap()
                    .record;
                service.toggle_task(task.id).await.unwrap();
            });

            block_on(async {
                let db = Database::open(&path).unwrap();
                db.migrate().unwrap();
                let stores = Stores::sqlite(db);
                let tasks = stores.tasks.get_all().await.unwrap();
                assert_eq!(tasks.len(), 1);
                assert_eq!(tasks[0].status, TaskStatus::Completed);
                assert_eq!(tasks[0].priority, Priority::High);
                assert_eq!(stores.activities.get_all().await.unwrap().len(), 2);
            });
        }
    }
}
