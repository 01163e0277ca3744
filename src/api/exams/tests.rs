use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::test_support;

fn exam_payload() -> serde_json::Value {
    json!({
        "title": "Algebra unit test",
        "start_date": "2020-01-01",
        "start_time": "09:00",
        "end_date": "2099-01-01",
        "end_time": "17:30",
        "per_question_seconds": 90,
        "syllabus_tags": ["algebra", "linear-equations"]
    })
}

#[tokio::test]
async fn admin_creates_exam_and_appends_questions() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_admin(ctx.state.db(), "admin001", "north", "admin-pass").await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&token),
            Some(exam_payload()),
        ))
        .await
        .expect("create exam");

    let status = response.status();
    let created = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    let exam_id = created["id"].as_str().expect("exam id").to_string();
    assert_eq!(created["per_question_seconds"], 90);

    for (prompt, correct) in [("What is 2+2?", "4"), ("What is 3*3?", "9")] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/exams/{exam_id}/questions"),
                Some(&token),
                Some(json!({
                    "prompt": prompt,
                    "options": ["1", "4", "9", "16"],
                    "correct_answer": correct
                })),
            ))
            .await
            .expect("append question");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let student =
        test_support::insert_student(ctx.state.db(), "student001", "north", "student-pass").await;
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/exams/active",
            Some(&student_token),
            None,
        ))
        .await
        .expect("list active");

    assert_eq!(response.status(), StatusCode::OK);
    let listing = test_support::read_json(response).await;
    let entries = listing.as_array().expect("array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], exam_id.as_str());
    assert_eq!(entries[0]["question_count"], 2);
    assert_eq!(entries[0]["attempted"], false);
}

#[tokio::test]
async fn student_cannot_author_exams() {
    let ctx = test_support::setup_test_context().await;

    let student =
        test_support::insert_student(ctx.state.db(), "student002", "north", "student-pass").await;
    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&token),
            Some(exam_payload()),
        ))
        .await
        .expect("create exam");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_rejects_inverted_or_unparseable_windows() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_admin(ctx.state.db(), "admin002", "north", "admin-pass").await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let mut inverted = exam_payload();
    inverted["start_date"] = json!("2099-01-01");
    inverted["end_date"] = json!("2020-01-01");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&token),
            Some(inverted),
        ))
        .await
        .expect("create exam");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut garbled = exam_payload();
    garbled["end_date"] = json!("someday");
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&token),
            Some(garbled),
        ))
        .await
        .expect("create exam");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn active_listing_is_branch_and_window_scoped() {
    let ctx = test_support::setup_test_context().await;

    let north_admin =
        test_support::insert_admin(ctx.state.db(), "admin003", "north", "admin-pass").await;
    let south_admin =
        test_support::insert_admin(ctx.state.db(), "admin004", "south", "admin-pass").await;

    test_support::insert_exam(ctx.state.db(), "Open north", &north_admin.id, test_support::open_window())
        .await;
    test_support::insert_exam(
        ctx.state.db(),
        "Open south",
        &south_admin.id,
        test_support::open_window(),
    )
    .await;
    test_support::insert_exam(
        ctx.state.db(),
        "Closed north",
        &north_admin.id,
        test_support::ExamFixture {
            start_date: "2020-01-01",
            start_time: "09:00",
            end_date: "2020-01-02",
            end_time: "17:00",
            per_question_seconds: None,
        },
    )
    .await;
    test_support::insert_exam(
        ctx.state.db(),
        "Broken north",
        &north_admin.id,
        test_support::ExamFixture {
            start_date: "2020-01-01",
            start_time: "09:00",
            end_date: "someday",
            end_time: "17:00",
            per_question_seconds: None,
        },
    )
    .await;

    let student =
        test_support::insert_student(ctx.state.db(), "student003", "north", "student-pass").await;
    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/exams/active", Some(&token), None))
        .await
        .expect("list active");

    assert_eq!(response.status(), StatusCode::OK);
    let listing = test_support::read_json(response).await;
    let titles: Vec<&str> = listing
        .as_array()
        .expect("array")
        .iter()
        .map(|entry| entry["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Open north"]);
}

#[tokio::test]
async fn attempt_payload_is_sanitized_and_budgeted() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_admin(ctx.state.db(), "admin005", "north", "admin-pass").await;
    let mut fixture = test_support::open_window();
    fixture.per_question_seconds = Some(90);
    let exam = test_support::insert_exam(ctx.state.db(), "Geography", &admin.id, fixture).await;

    for (prompt, correct) in
        [("Capital of France?", "Paris"), ("Capital of Japan?", "Tokyo"), ("Capital of Peru?", "Lima")]
    {
        test_support::insert_question(
            ctx.state.db(),
            &exam.id,
            prompt,
            &["London", "Quito", "Osaka"],
            correct,
        )
        .await;
    }

    let student =
        test_support::insert_student(ctx.state.db(), "student004", "north", "student-pass").await;
    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{}/attempt", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("begin attempt");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = test_support::read_json(response).await;
    assert_eq!(payload["per_question_seconds"], 90);
    assert_eq!(payload["total_duration_seconds"], 270);
    assert_eq!(payload["questions"].as_array().unwrap().len(), 3);

    let raw = payload.to_string();
    for correct in ["Paris", "Tokyo", "Lima"] {
        assert!(!raw.contains(correct), "leaked correct answer {correct}: {raw}");
    }
}

#[tokio::test]
async fn attempt_is_denied_across_branches_and_for_missing_exams() {
    let ctx = test_support::setup_test_context().await;

    let south_admin =
        test_support::insert_admin(ctx.state.db(), "admin006", "south", "admin-pass").await;
    let exam =
        test_support::insert_exam(ctx.state.db(), "South only", &south_admin.id, test_support::open_window())
            .await;

    let student =
        test_support::insert_student(ctx.state.db(), "student005", "north", "student-pass").await;
    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{}/attempt", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("begin attempt");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams/no-such-exam/attempt",
            Some(&token),
            None,
        ))
        .await
        .expect("begin attempt");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

async fn seeded_three_question_exam(
    ctx: &test_support::TestContext,
) -> (crate::db::models::Exam, crate::db::models::User) {
    let admin = test_support::insert_admin(ctx.state.db(), "admin007", "north", "admin-pass").await;
    let exam =
        test_support::insert_exam(ctx.state.db(), "Midterm", &admin.id, test_support::open_window())
            .await;

    for (prompt, correct) in [("First?", "B"), ("Second?", "C"), ("Third?", "A")] {
        test_support::insert_question(ctx.state.db(), &exam.id, prompt, &["A", "B", "C", "D"], correct)
            .await;
    }

    let student =
        test_support::insert_student(ctx.state.db(), "student006", "north", "student-pass").await;
    (exam, student)
}

#[tokio::test]
async fn submission_grades_and_reports_feedback() {
    let ctx = test_support::setup_test_context().await;
    let (exam, student) = seeded_three_question_exam(&ctx).await;
    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let questions =
        crate::repositories::exams::list_questions(ctx.state.db(), &exam.id).await.expect("questions");
    let answers = json!({
        "answers": [
            { "question_id": questions[0].id, "answer": "B" },
            { "question_id": questions[1].id, "answer": "X" },
            { "question_id": questions[2].id, "answer": "A" }
        ]
    });

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{}/submit", exam.id),
            Some(&token),
            Some(answers),
        ))
        .await
        .expect("submit");

    assert_eq!(response.status(), StatusCode::OK);
    let graded = test_support::read_json(response).await;
    assert_eq!(graded["score"], 4);
    assert_eq!(graded["per_correct_marks"], 2);
    assert_eq!(graded["total_marks_after"], 4);
    assert_eq!(graded["reason"], "manual");

    let feedback = graded["feedback"].as_array().expect("feedback");
    let flags: Vec<(bool, bool)> = feedback
        .iter()
        .map(|f| (f["matched"].as_bool().unwrap(), f["correct"].as_bool().unwrap()))
        .collect();
    assert_eq!(flags, vec![(true, true), (true, false), (true, true)]);
    assert!(!graded.to_string().contains("correct_answer"));

    // A repeat submission conflicts and the total is not credited twice.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{}/submit", exam.id),
            Some(&token),
            Some(json!({ "answers": [] })),
        ))
        .await
        .expect("second submit");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let total = crate::repositories::users::total_marks(ctx.state.db(), &student.id)
        .await
        .expect("total marks");
    assert_eq!(total, Some(4));

    // Begin-attempt is now refused as well.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{}/attempt", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("begin attempt");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn concurrent_submissions_record_exactly_once() {
    let ctx = test_support::setup_test_context().await;
    let (exam, student) = seeded_three_question_exam(&ctx).await;
    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let questions =
        crate::repositories::exams::list_questions(ctx.state.db(), &exam.id).await.expect("questions");
    let answers = json!({
        "answers": [
            { "question_id": questions[0].id, "answer": "B" },
            { "question_id": questions[1].id, "answer": "C" },
            { "question_id": questions[2].id, "answer": "A" }
        ]
    });

    let submit = |body: serde_json::Value| {
        let app = ctx.app.clone();
        let token = token.clone();
        let uri = format!("/api/v1/exams/{}/submit", exam.id);
        async move {
            app.oneshot(test_support::json_request(Method::POST, &uri, Some(&token), Some(body)))
                .await
                .expect("submit")
                .status()
        }
    };

    let (first, second) = tokio::join!(submit(answers.clone()), submit(answers.clone()));

    let statuses = [first, second];
    assert!(statuses.contains(&StatusCode::OK), "statuses: {statuses:?}");
    assert!(statuses.contains(&StatusCode::CONFLICT), "statuses: {statuses:?}");

    let total = crate::repositories::users::total_marks(ctx.state.db(), &student.id)
        .await
        .expect("total marks");
    assert_eq!(total, Some(6));
}

#[tokio::test]
async fn submission_after_the_window_closes_is_rejected() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_admin(ctx.state.db(), "admin008", "north", "admin-pass").await;
    let exam = test_support::insert_exam(
        ctx.state.db(),
        "Long gone",
        &admin.id,
        test_support::ExamFixture {
            start_date: "2020-01-01",
            start_time: "09:00",
            end_date: "2020-01-02",
            end_time: "17:00",
            per_question_seconds: None,
        },
    )
    .await;

    let student =
        test_support::insert_student(ctx.state.db(), "student007", "north", "student-pass").await;
    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{}/submit", exam.id),
            Some(&token),
            Some(json!({ "answers": [] })),
        ))
        .await
        .expect("submit");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn forced_submissions_carry_their_reason() {
    let ctx = test_support::setup_test_context().await;
    let (exam, student) = seeded_three_question_exam(&ctx).await;
    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{}/submit", exam.id),
            Some(&token),
            Some(json!({ "answers": [], "reason": "integrity" })),
        ))
        .await
        .expect("submit");

    assert_eq!(response.status(), StatusCode::OK);
    let graded = test_support::read_json(response).await;
    assert_eq!(graded["score"], 0);
    assert_eq!(graded["reason"], "integrity");

    let attempt =
        crate::repositories::attempts::find_for_user_exam(ctx.state.db(), &student.id, &exam.id)
            .await
            .expect("attempt")
            .expect("recorded");
    assert_eq!(attempt.reason, crate::db::types::SubmitReason::Integrity);
    assert_eq!(attempt.marks, 0);
}
