// tests/query_tests.rs

use chrono::{DateTime, Utc};
use itembank::{
    Arg, Pool, PoolCounts, Question, QuestionSort, QuestionStorage, RecordStore, RequestCache,
    StoreConfig, paginate,
};

/// Helper function to build a storage layer on a fresh in-memory store.
async fn setup() -> QuestionStorage {
    let store = RecordStore::connect(&StoreConfig::in_memory())
        .await
        .expect("Failed to connect to in-memory store");
    QuestionStorage::new(store)
}

fn unique_context() -> String {
    format!("ctx_{}", &uuid::Uuid::new_v4().to_string()[..8])
}

fn now_millis() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).expect("timestamp in range")
}

async fn make_pool(storage: &QuestionStorage, context: &str, title: &str) -> Pool {
    let mut pool = Pool::new(context, title);
    storage.save_pool(&mut pool).await.expect("Failed to save pool");
    pool
}

/// A finalized, usable assessment question, ready to tweak and save.
fn live_question(context: &str, pool: &Pool, question_type: &str) -> Question {
    let mut question = Question::new(context, question_type, "seeder", now_millis());
    question.pool_id = pool.id;
    question.mint = false;
    question.valid = true;
    question
}

async fn save(storage: &QuestionStorage, cache: &mut RequestCache, question: &mut Question) {
    storage
        .save_question(cache, question)
        .await
        .expect("Failed to save question");
}

fn ids(questions: &[Question]) -> Vec<Option<i64>> {
    questions.iter().map(|q| q.id).collect()
}

#[tokio::test]
async fn count_context_questions_applies_filters_conjunctively() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;

    let mut a = live_question(&context, &pool, "mc");
    save(&storage, &mut cache, &mut a).await;
    let mut b = live_question(&context, &pool, "mc");
    b.survey = true;
    save(&storage, &mut cache, &mut b).await;
    let mut c = live_question(&context, &pool, "essay");
    c.valid = false;
    save(&storage, &mut cache, &mut c).await;

    // Act / Assert
    let count = |question_type: Option<&'static str>, survey, valid| {
        let storage = storage.clone();
        let context = context.clone();
        async move {
            storage
                .count_context_questions(&context, question_type, survey, valid)
                .await
                .expect("Failed to count")
        }
    };
    assert_eq!(count(None, None, None).await, 3);
    assert_eq!(count(Some("mc"), None, None).await, 2);
    assert_eq!(count(None, Some(false), Some(true)).await, 1);
    assert_eq!(count(Some("essay"), Some(false), Some(false)).await, 1);
    assert_eq!(count(Some("match"), None, None).await, 0);
}

#[tokio::test]
async fn count_pool_questions_buckets_by_survey_and_valid() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;

    for (survey, valid) in [(false, true), (false, false), (true, true), (true, false)] {
        let mut question = live_question(&context, &pool, "mc");
        question.survey = survey;
        question.valid = valid;
        save(&storage, &mut cache, &mut question).await;
    }
    let mut draft = live_question(&context, &pool, "mc");
    draft.mint = true;
    save(&storage, &mut cache, &mut draft).await;
    let mut archived = live_question(&context, &pool, "essay");
    archived.historical = true;
    save(&storage, &mut cache, &mut archived).await;

    // Act
    let counts = storage
        .count_pool_questions(&pool, None)
        .await
        .expect("Failed to count pool");

    // Assert: the archive counts, the draft does not
    assert_eq!(counts.valid_assessment, 2);
    assert_eq!(counts.invalid_assessment, 1);
    assert_eq!(counts.valid_survey, 1);
    assert_eq!(counts.invalid_survey, 1);
    assert_eq!(counts.total(), 5);

    // Act / Assert: the type filter narrows every bucket
    let mc_only = storage
        .count_pool_questions(&pool, Some("mc"))
        .await
        .expect("Failed to count pool");
    assert_eq!(mc_only.valid_assessment, 1);
    assert_eq!(mc_only.total(), 4);
}

#[tokio::test]
async fn context_pool_counts_zero_fill_empty_pools() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let other_context = unique_context();

    let full = make_pool(&storage, &context, "Full").await;
    let empty = make_pool(&storage, &context, "Empty").await;
    let mut draft_pool = Pool::new(&context, "Draft");
    draft_pool.mint = true;
    storage
        .save_pool(&mut draft_pool)
        .await
        .expect("Failed to save pool");
    let mut old_pool = Pool::new(&context, "Old");
    old_pool.historical = true;
    storage
        .save_pool(&mut old_pool)
        .await
        .expect("Failed to save pool");
    let elsewhere = make_pool(&storage, &other_context, "Elsewhere").await;

    let mut a = live_question(&context, &full, "mc");
    save(&storage, &mut cache, &mut a).await;
    let mut b = live_question(&context, &full, "mc");
    b.survey = true;
    b.valid = false;
    save(&storage, &mut cache, &mut b).await;
    let mut draft = live_question(&context, &full, "mc");
    draft.mint = true;
    save(&storage, &mut cache, &mut draft).await;
    let mut in_draft_pool = live_question(&context, &draft_pool, "mc");
    save(&storage, &mut cache, &mut in_draft_pool).await;
    let mut far_away = live_question(&other_context, &elsewhere, "mc");
    save(&storage, &mut cache, &mut far_away).await;

    // Act
    let counts = storage
        .count_context_pool_questions(&context)
        .await
        .expect("Failed to count pools");

    // Assert: only the live pools of the context appear, the empty one
    // with zero counts
    assert_eq!(counts.len(), 2);
    let full_counts = counts[&full.id.expect("id")];
    assert_eq!(full_counts.valid_assessment, 1);
    assert_eq!(full_counts.invalid_survey, 1);
    assert_eq!(full_counts.total(), 2);
    assert_eq!(counts[&empty.id.expect("id")], PoolCounts::default());
}

#[tokio::test]
async fn sort_by_type_orders_listings() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;
    for question_type in ["b", "a", "c"] {
        let mut question = live_question(&context, &pool, question_type);
        save(&storage, &mut cache, &mut question).await;
    }

    // Act
    let ascending = storage
        .find_context_questions(
            &mut cache,
            &context,
            QuestionSort::TypeAsc,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .expect("Failed to list");
    let descending = storage
        .find_context_questions(
            &mut cache,
            &context,
            QuestionSort::TypeDesc,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .expect("Failed to list");

    // Assert
    let types: Vec<&str> = ascending.iter().map(|q| q.question_type.as_str()).collect();
    assert_eq!(types, ["a", "b", "c"]);
    let types: Vec<&str> = descending
        .iter()
        .map(|q| q.question_type.as_str())
        .collect();
    assert_eq!(types, ["c", "b", "a"]);
}

#[tokio::test]
async fn sort_by_title_uses_side_table() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;
    for title in ["banana", "apple", "cherry"] {
        let mut question = live_question(&context, &pool, "mc");
        question.set_title(Some(title));
        save(&storage, &mut cache, &mut question).await;
    }

    // Act
    let listed = storage
        .find_context_questions(
            &mut cache,
            &context,
            QuestionSort::TitleAsc,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .expect("Failed to list");

    // Assert
    let titles: Vec<Option<&str>> = listed.iter().map(|q| q.title()).collect();
    assert_eq!(
        titles,
        [Some("apple"), Some("banana"), Some("cherry")]
    );
}

#[tokio::test]
async fn sort_by_description_follows_presentation_text() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;
    for text in ["<p>beta</p>", "<p>alpha</p>", "<p>gamma</p>"] {
        let mut question = live_question(&context, &pool, "mc");
        question.presentation_text = Some(text.to_string());
        save(&storage, &mut cache, &mut question).await;
    }

    // Act
    let listed = storage
        .find_context_questions(
            &mut cache,
            &context,
            QuestionSort::DescriptionAsc,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .expect("Failed to list");

    // Assert: the derived plain-text summary drives the order
    let descriptions: Vec<Option<&str>> =
        listed.iter().map(|q| q.description.as_deref()).collect();
    assert_eq!(
        descriptions,
        [Some("alpha"), Some("beta"), Some("gamma")]
    );
}

#[tokio::test]
async fn sort_by_pool_attributes_uses_joined_pool() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let mut easy = Pool::new(&context, "zzz");
    easy.difficulty = 1;
    easy.points = 5.0;
    storage.save_pool(&mut easy).await.expect("Failed to save pool");
    let mut hard = Pool::new(&context, "aaa");
    hard.difficulty = 5;
    hard.points = 1.0;
    storage.save_pool(&mut hard).await.expect("Failed to save pool");

    let mut in_easy = live_question(&context, &easy, "mc");
    save(&storage, &mut cache, &mut in_easy).await;
    let mut in_hard = live_question(&context, &hard, "mc");
    save(&storage, &mut cache, &mut in_hard).await;

    let list = |sort| {
        let storage = storage.clone();
        let context = context.clone();
        async move {
            let mut cache = RequestCache::new();
            storage
                .find_context_questions(&mut cache, &context, sort, None, None, None, None, None)
                .await
                .expect("Failed to list")
        }
    };

    // Act / Assert
    let by_difficulty = list(QuestionSort::PoolDifficultyAsc).await;
    assert_eq!(ids(&by_difficulty), [in_easy.id, in_hard.id]);
    let by_points = list(QuestionSort::PoolPointsAsc).await;
    assert_eq!(ids(&by_points), [in_hard.id, in_easy.id]);
    let by_title = list(QuestionSort::PoolTitleAsc).await;
    assert_eq!(ids(&by_title), [in_hard.id, in_easy.id]);
    let by_title_desc = list(QuestionSort::PoolTitleDesc).await;
    assert_eq!(ids(&by_title_desc), [in_easy.id, in_hard.id]);
}

#[tokio::test]
async fn created_date_sort_breaks_ties_by_id() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;
    let moment = DateTime::from_timestamp_millis(1_700_000_000_000).expect("timestamp in range");

    let mut first = live_question(&context, &pool, "mc");
    first.created.date = moment;
    save(&storage, &mut cache, &mut first).await;
    let mut second = live_question(&context, &pool, "mc");
    second.created.date = moment;
    save(&storage, &mut cache, &mut second).await;
    let mut third = live_question(&context, &pool, "mc");
    third.created.date = moment + chrono::Duration::milliseconds(1_000);
    save(&storage, &mut cache, &mut third).await;

    // Act
    let ascending = storage
        .find_context_questions(
            &mut cache,
            &context,
            QuestionSort::CreatedDateAsc,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .expect("Failed to list");
    let descending = storage
        .find_context_questions(
            &mut cache,
            &context,
            QuestionSort::CreatedDateDesc,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .expect("Failed to list");

    // Assert: equal dates fall back to id, in the same direction
    assert_eq!(ids(&ascending), [first.id, second.id, third.id]);
    assert_eq!(ids(&descending), [third.id, second.id, first.id]);
}

#[tokio::test]
async fn sort_ties_on_title_fall_back_to_creation_date() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;
    let moment = DateTime::from_timestamp_millis(1_700_000_000_000).expect("timestamp in range");

    // The later-created twin is saved first, so id order disagrees with
    // date order.
    let mut late_twin = live_question(&context, &pool, "mc");
    late_twin.set_title(Some("same"));
    late_twin.presentation_text = Some("<p>shared body</p>".to_string());
    late_twin.created.date = moment + chrono::Duration::minutes(1);
    save(&storage, &mut cache, &mut late_twin).await;
    let mut early_twin = live_question(&context, &pool, "mc");
    early_twin.set_title(Some("same"));
    early_twin.presentation_text = Some("<p>shared body</p>".to_string());
    early_twin.created.date = moment;
    save(&storage, &mut cache, &mut early_twin).await;
    let mut other = live_question(&context, &pool, "mc");
    other.set_title(Some("alpha"));
    other.created.date = moment;
    save(&storage, &mut cache, &mut other).await;

    // Act
    let ascending = storage
        .find_context_questions(
            &mut cache,
            &context,
            QuestionSort::TitleAsc,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .expect("Failed to list");
    let descending = storage
        .find_context_questions(
            &mut cache,
            &context,
            QuestionSort::TitleDesc,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .expect("Failed to list");

    // Assert: tied titles order by creation date, in the sort's direction
    assert_eq!(ids(&ascending), [other.id, early_twin.id, late_twin.id]);
    assert_eq!(ids(&descending), [late_twin.id, early_twin.id, other.id]);
}

#[test]
fn paginate_windows_and_clamps() {
    let items: Vec<i32> = (1..=5).collect();
    assert_eq!(paginate(items.clone(), Some(1), Some(2)), vec![1, 2]);
    assert_eq!(paginate(items.clone(), Some(2), Some(2)), vec![3, 4]);
    assert_eq!(paginate(items.clone(), Some(3), Some(2)), vec![5]);
    assert_eq!(paginate(items.clone(), Some(0), Some(2)), Vec::<i32>::new());
    assert_eq!(paginate(items.clone(), Some(9), Some(2)), Vec::<i32>::new());
    assert_eq!(paginate(Vec::<i32>::new(), Some(1), Some(2)), Vec::<i32>::new());
    assert_eq!(paginate(items.clone(), None, Some(2)), items);
}

#[tokio::test]
async fn listing_pages_are_clamped_windows() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;
    let mut all_ids = Vec::new();
    for n in 1..=5 {
        let mut question = live_question(&context, &pool, "mc");
        question.created.date = DateTime::from_timestamp_millis(n * 1_000).expect("timestamp");
        save(&storage, &mut cache, &mut question).await;
        all_ids.push(question.id);
    }

    let page = |page_num, page_size| {
        let storage = storage.clone();
        let context = context.clone();
        async move {
            let mut cache = RequestCache::new();
            storage
                .find_context_questions(
                    &mut cache,
                    &context,
                    QuestionSort::CreatedDateAsc,
                    None,
                    page_num,
                    page_size,
                    None,
                    None,
                )
                .await
                .expect("Failed to list")
        }
    };

    // Act / Assert
    assert_eq!(ids(&page(Some(1), Some(2)).await), all_ids[0..2]);
    assert_eq!(ids(&page(Some(3), Some(2)).await), all_ids[4..5]);
    assert!(page(Some(0), Some(2)).await.is_empty());
    assert!(page(Some(9), Some(2)).await.is_empty());
    assert_eq!(ids(&page(None, None).await), all_ids);
}

#[tokio::test]
async fn archived_questions_list_in_pools_not_contexts() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;

    let mut live = live_question(&context, &pool, "mc");
    save(&storage, &mut cache, &mut live).await;
    let mut archived = live_question(&context, &pool, "mc");
    archived.historical = true;
    save(&storage, &mut cache, &mut archived).await;

    // Act
    let in_pool = storage
        .find_pool_questions(
            &mut cache,
            &pool,
            QuestionSort::CreatedDateAsc,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .expect("Failed to list pool");
    let in_context = storage
        .find_context_questions(
            &mut cache,
            &context,
            QuestionSort::CreatedDateAsc,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .expect("Failed to list context");

    // Assert
    assert_eq!(in_pool.len(), 2);
    assert_eq!(ids(&in_context), [live.id]);
    let count = storage
        .count_context_questions(&context, None, None, None)
        .await
        .expect("Failed to count");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn pool_question_ids_filter_and_order() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;

    let mut assessment = live_question(&context, &pool, "mc");
    save(&storage, &mut cache, &mut assessment).await;
    let mut survey = live_question(&context, &pool, "mc");
    survey.survey = true;
    save(&storage, &mut cache, &mut survey).await;
    let mut unusable = live_question(&context, &pool, "mc");
    unusable.valid = false;
    save(&storage, &mut cache, &mut unusable).await;
    let mut draft = live_question(&context, &pool, "mc");
    draft.mint = true;
    save(&storage, &mut cache, &mut draft).await;

    // Act / Assert
    let all = storage
        .get_pool_question_ids(&pool, None, None)
        .await
        .expect("Failed to list ids");
    assert_eq!(
        all,
        [assessment.id, survey.id, unusable.id]
            .map(|id| id.expect("id"))
            .to_vec()
    );
    let valid_only = storage
        .get_pool_question_ids(&pool, None, Some(true))
        .await
        .expect("Failed to list ids");
    assert_eq!(
        valid_only,
        [assessment.id, survey.id].map(|id| id.expect("id")).to_vec()
    );
    let valid_assessments = storage
        .get_pool_question_ids(&pool, Some(false), Some(true))
        .await
        .expect("Failed to list ids");
    assert_eq!(valid_assessments, vec![assessment.id.expect("id")]);
}

#[tokio::test]
async fn non_historical_ids_include_drafts() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;

    let mut draft = live_question(&context, &pool, "mc");
    draft.mint = true;
    save(&storage, &mut cache, &mut draft).await;
    let mut live = live_question(&context, &pool, "mc");
    save(&storage, &mut cache, &mut live).await;
    let mut archived = live_question(&context, &pool, "mc");
    archived.historical = true;
    save(&storage, &mut cache, &mut archived).await;

    // Act
    let found = storage
        .find_all_non_historical_ids()
        .await
        .expect("Failed to list ids");

    // Assert
    assert_eq!(
        found,
        [draft.id, live.id].map(|id| id.expect("id")).to_vec()
    );
}

#[tokio::test]
async fn undecodable_rows_are_skipped_not_fatal() {
    // Arrange
    let storage = setup().await;
    let mut cache = RequestCache::new();
    let context = unique_context();
    let pool = make_pool(&storage, &context, "Pool").await;

    let mut good_a = live_question(&context, &pool, "mc");
    save(&storage, &mut cache, &mut good_a).await;
    let mut good_b = live_question(&context, &pool, "mc");
    save(&storage, &mut cache, &mut good_b).await;

    // A row whose guest column is not a JSON array.
    let bad_id = storage
        .store()
        .insert(
            "INSERT INTO questions \
             (context, type, pool_id, guest, mint, created_by, created_at, modified_by, modified_at) \
             VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?)",
            &[
                Arg::from(context.as_str()),
                Arg::from("mc"),
                Arg::Int(pool.id.expect("id")),
                Arg::from("not json"),
                Arg::from("seeder"),
                Arg::Int(1_000),
                Arg::from("seeder"),
                Arg::Int(1_000),
            ],
        )
        .await
        .expect("Failed to insert corrupt row");

    // Act
    let mut fresh = RequestCache::new();
    let listed = storage
        .find_context_questions(
            &mut fresh,
            &context,
            QuestionSort::CreatedDateAsc,
            None,
            None,
            None,
            None,
            None,
        )
        .await
        .expect("Listing should not fail");

    // Assert: the corrupt row is skipped, not fatal
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|q| q.id != Some(bad_id)));
    // Counting happens in SQL and still sees the row.
    let count = storage
        .count_context_questions(&context, None, None, None)
        .await
        .expect("Failed to count");
    assert_eq!(count, 3);
    // A direct lookup of the corrupt row reports absence, not an error.
    let got = storage
        .get_question(&mut fresh, bad_id)
        .await
        .expect("Lookup should not fail");
    assert!(got.is_none());
}
