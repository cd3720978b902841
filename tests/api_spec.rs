use speculate2::speculate;

speculate! {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use salesdeck::api;
    use salesdeck::store::Stores;
    use serde_json::{json, Value};
    use tokio_test::block_on;

    fn server() -> TestServer {
        TestServer::new(api::create_router(Stores::memory())).unwrap()
    }

    async fn post(server: &TestServer, path: &str, body: Value) -> Value {
        let response = server.post(path).json(&body).await;
        response.assert_status_ok();
        response.json::<Value>()["data"].clone()
    }

    describe "record endpoints" {
        it "answers the health check" {
            block_on(async {
                let body = server().get("/api/health").await.json::<Value>();
                assert_eq!(body, json!({ "success": true, "data": "ok" }));
            });
        }

        it "stores contacts in backend field names" {
            block_on(async {
                let server = server();
                let created = post(&server, "/api/records/contact", json!({
                    "Name": "Ada Lovelace",
                    "email": "ada@example.com",
                    "Tags": "vip, math",
                })).await;
                assert_eq!(created["Id"], 1);
                assert_eq!(created["Name"], "Ada Lovelace");
                assert_eq!(created["Tags"], "vip,math");
                assert!(created["CreatedOn"].is_string());
                assert!(created.get("name").is_none());

                let listed = server.get("/api/records/contact").await.json::<Value>();
                assert_eq!(listed["data"].as_array().unwrap().len(), 1);

                let patched = server
                    .patch("/api/records/contact/1")
                    .json(&json!({ "company": "Analytical Engines" }))
                    .await
                    .json::<Value>();
                assert_eq!(patched["data"]["company"], "Analytical Engines");
                assert_eq!(patched["data"]["Name"], "Ada Lovelace");

                let deleted = server.delete("/api/records/contact/1").await.json::<Value>();
                assert_eq!(deleted["data"], true);
                server
                    .get("/api/records/contact/1")
                    .await
                    .assert_status(StatusCode::NOT_FOUND);
            });
        }

        it "reports validation failures field by field" {
            block_on(async {
                let response = server()
                    .post("/api/records/deal")
                    .json(&json!({ "Name": "", "value": -5 }))
                    .await;
                response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
                let body = response.json::<Value>();
                assert_eq!(body["success"], false);
                assert!(body.get("data").is_none());
                let fields: Vec<&str> = body["errors"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .filter_map(|e| e["field"].as_str())
                    .collect();
                assert!(fields.contains(&"title"));
                assert!(fields.contains(&"value"));
                assert!(fields.contains(&"contactId"));
            });
        }

        it "rejects unknown collections" {
            block_on(async {
                let response = server().get("/api/records/invoice").await;
                response.assert_status(StatusCode::NOT_FOUND);
                assert_eq!(response.json::<Value>()["success"], false);
            });
        }

        it "filters custom field definitions by entity" {
            block_on(async {
                let server = server();
                let field = post(&server, "/api/records/custom_field", json!({
                    "label": "Lead Source",
                    "type": "select",
                    "entity": "contact",
                    "required": "false",
                    "options": "Web,Referral",
                })).await;
                assert_eq!(field["Name"], "lead_source");
                assert_eq!(field["options"], "Web,Referral");
                post(&server, "/api/records/custom_field", json!({
                    "label": "Budget",
                    "type": "number",
                    "entity": "deal",
                })).await;

                let contact_fields = server
                    .get("/api/records/custom_field")
                    .add_query_param("entity", "contact")
                    .await
                    .json::<Value>();
                let labels: Vec<&str> = contact_fields["data"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .filter_map(|f| f["label"].as_str())
                    .collect();
                assert_eq!(labels, vec!["Lead Source"]);
            });
        }

        it "checks custom values on contact and deal writes" {
            block_on(async {
                let server = server();
                let field = post(&server, "/api/records/custom_field", json!({
                    "label": "Industry",
                    "type": "select",
                    "entity": "contact",
                    "required": true,
                    "options": "Retail,Energy",
                })).await;
                let key = field["Id"].to_string();
                let error_field = format!("customFields.{}", key);

                let response = server
                    .post("/api/records/contact")
                    .json(&json!({ "Name": "Ada", "email": "ada@example.com" }))
                    .await;
                response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
                let body = response.json::<Value>();
                assert_eq!(body["errors"][0]["field"], error_field.as_str());
                assert!(server.get("/api/records/contact").await.json::<Value>()["data"]
                    .as_array()
                    .unwrap()
                    .is_empty());

                let response = server
                    .post("/api/records/contact")
                    .json(&json!({
                        "Name": "Ada",
                        "email": "ada@example.com",
                        "customFields": { (key.clone()): "Mining" },
                    }))
                    .await;
                response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

                let created = post(&server, "/api/records/contact", json!({
                    "Name": "Ada",
                    "email": "ada@example.com",
                    "customFields": { (key.clone()): "Energy" },
                })).await;
                let path = format!("/api/records/contact/{}", created["Id"]);

                server
                    .patch(&path)
                    .json(&json!({ "customFields": { "999": "x" } }))
                    .await
                    .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
                let renamed = server.patch(&path).json(&json!({ "Name": "Ada L." })).await;
                renamed.assert_status_ok();
                assert_eq!(renamed.json::<Value>()["data"]["customFields"][key.as_str()], "Energy");

                // Deals have no definitions yet, so any key is unknown.
                let response = server
                    .post("/api/records/deal")
                    .json(&json!({
                        "Name": "Renewal",
                        "value": 10,
                        "contactId": created["Id"],
                        "customFields": { (key.clone()): "Energy" },
                    }))
                    .await;
                response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
            });
        }
    }

    describe "view endpoints" {
        it "moves deals between pipeline stages" {
            block_on(async {
                let server = server();
                post(&server, "/api/records/contact", json!({
                    "Name": "Grace Hopper",
                    "email": "grace@example.com",
                })).await;
                post(&server, "/api/records/deal", json!({
                    "Name": "Compiler licence",
                    "value": 500,
                    "contactId": 1,
                })).await;

                let moved = server
                    .post("/api/pipeline/deals/1/stage")
                    .json(&json!({ "stage": "qualified" }))
                    .await
                    .json::<Value>();
                assert_eq!(moved["data"]["outcome"], "moved");
                assert_eq!(moved["data"]["deal"]["stage"], "qualified");
                assert_eq!(
                    moved["data"]["activity"]["description"],
                    "Moved deal to qualified: Compiler licence"
                );

                let same = server
                    .post("/api/pipeline/deals/1/stage")
                    .json(&json!({ "stage": "qualified" }))
                    .await
                    .json::<Value>();
                assert_eq!(same["data"]["outcome"], "unchanged");

                let board = server.get("/api/pipeline").await.json::<Value>();
                let columns = board["data"]["pipeline"]["columns"].as_array().unwrap();
                assert_eq!(columns.len(), 6);
                assert_eq!(columns[1]["stage"], "qualified");
                assert_eq!(columns[1]["totalValue"], 500.0);
                assert_eq!(board["data"]["totalValue"], 500.0);
                assert_eq!(board["data"]["contacts"].as_array().unwrap().len(), 1);

                server
                    .post("/api/pipeline/deals/1/stage")
                    .json(&json!({ "stage": "won" }))
                    .await
                    .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
                server
                    .post("/api/pipeline/deals/42/stage")
                    .json(&json!({ "stage": "lead" }))
                    .await
                    .assert_status(StatusCode::NOT_FOUND);
            });
        }

        it "serves filtered and sorted lists" {
            block_on(async {
                let server = server();
                for (name, tags) in [("Zed", "vip"), ("Amy", ""), ("Bob", "vip")] {
                    post(&server, "/api/records/contact", json!({
                        "Name": name,
                        "email": format!("{}@example.com", name.to_lowercase()),
                        "Tags": tags,
                    })).await;
                }

                let body = server
                    .get("/api/views/contacts")
                    .add_query_param("filter", "vip")
                    .add_query_param("sort", "name")
                    .await
                    .json::<Value>();
                let names: Vec<&str> = body["data"]["records"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .filter_map(|c| c["name"].as_str())
                    .collect();
                assert_eq!(names, vec!["Bob", "Zed"]);
                assert_eq!(body["data"]["tags"], json!(["vip"]));

                server
                    .get("/api/views/tasks")
                    .add_query_param("filter", "someday")
                    .await
                    .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
            });
        }

        it "summarizes the dashboard" {
            block_on(async {
                let server = server();
                post(&server, "/api/records/contact", json!({
                    "Name": "Ada",
                    "email": "ada@example.com",
                })).await;
                post(&server, "/api/records/task", json!({ "Name": "Call Ada" })).await;

                let body = server.get("/api/dashboard").await.json::<Value>();
                let stats = &body["data"]["stats"];
                assert_eq!(stats["totalContacts"], 1);
                assert_eq!(stats["totalDeals"], 0);
                assert_eq!(stats["activeTasks"], 1);
                assert_eq!(stats["winRate"], 0);
            });
        }

        it "returns a contact with its related records" {
            block_on(async {
                let server = server();
                post(&server, "/api/records/contact", json!({
                    "Name": "Ada",
                    "email": "ada@example.com",
                })).await;
                post(&server, "/api/records/task", json!({ "Name": "Call Ada", "contactId": 1 })).await;
                post(&server, "/api/records/task", json!({ "Name": "Unrelated" })).await;

                let body = server.get("/api/contacts/1/overview").await.json::<Value>();
                assert_eq!(body["data"]["contact"]["name"], "Ada");
                assert_eq!(body["data"]["tasks"].as_array().unwrap().len(), 1);

                server
                    .get("/api/contacts/9/overview")
                    .await
                    .assert_status(StatusCode::NOT_FOUND);
            });
        }
    }
}
