use bastion_core::ErrorKind;
use bastion_tests::*;
use serde_json::{json, Value as JsonValue};

fn sample_row(label: &str, quantity: i64) -> JsonValue {
    json!({
        "label": label,
        "quantity": quantity,
        "big": "9007199254740993",
        "ratio": 1.5,
        "price": "12.34",
        "active": true,
        "bornAt": "2024-03-01T10:20:30.000Z",
        "payload": "AQID",
        "meta": { "a": [1, 2], "b": null },
        "tags": ["x", "y"],
        "nickname": null
    })
}

async fn samples(count: i64) -> anyhow::Result<Runner> {
    let runner = Runner::load(schemas::scalars()).await?;

    for i in 1..=count {
        runner
            .db()
            .model("Sample")
            .create(json!({ "data": sample_row(&format!("s{i}"), i) }))
            .await?;
    }

    Ok(runner)
}

#[tokio::test]
async fn every_scalar_type_reads_back_as_written() -> TestResult {
    let runner = Runner::load(schemas::scalars()).await?;
    let db = runner.db();

    let mut expected = sample_row("first", 42);
    expected["id"] = json!(1);

    assert_query!(db.model("Sample").create(json!({ "data": sample_row("first", 42) })), expected.clone());
    assert_query!(db.model("Sample").find_unique(json!({ "where": { "id": 1 } })), expected);

    Ok(())
}

#[tokio::test]
async fn dates_are_normalized_to_utc() -> TestResult {
    let runner = Runner::load(schemas::scalars()).await?;
    let mut data = sample_row("offset", 1);
    data["bornAt"] = json!("2024-03-01T12:20:30+02:00");

    assert_query!(
        runner.db().model("Sample").create(json!({ "data": data, "select": { "bornAt": true } })),
        { "bornAt": "2024-03-01T10:20:30.000Z" }
    );

    Ok(())
}

#[tokio::test]
async fn a_negative_take_returns_the_last_rows_in_order() -> TestResult {
    let runner = samples(5).await?;
    let db = runner.db();

    assert_query!(
        db.model("Sample").find_many(json!({
            "orderBy": { "id": "asc" },
            "take": -2,
            "select": { "id": true }
        })),
        [{ "id": 4 }, { "id": 5 }]
    );

    assert_query!(
        db.model("Sample").find_many(json!({
            "orderBy": { "id": "asc" },
            "take": -2,
            "skip": 1,
            "select": { "id": true }
        })),
        [{ "id": 3 }, { "id": 4 }]
    );

    assert_query!(
        db.model("Sample").find_first(json!({
            "orderBy": { "id": "asc" },
            "take": -1,
            "select": { "id": true }
        })),
        { "id": 5 }
    );

    Ok(())
}

#[tokio::test]
async fn unique_filters_must_name_a_unique_criterion() -> TestResult {
    let runner = samples(2).await?;
    let sample = runner.db().model("Sample");

    assert_query!(
        sample.find_unique(json!({ "where": { "label": "s2" }, "select": { "id": true } })),
        { "id": 2 }
    );

    for filter in [json!({}), json!({ "quantity": 2 }), json!({ "nickname": null })] {
        let err = expect_err(sample.find_unique(json!({ "where": filter })).await);

        assert_eq!(ErrorKind::InvalidInput, err.kind(), "{err}");
    }

    assert_query!(
        sample.find_unique(json!({ "where": { "label": "s2", "quantity": 2 }, "select": { "id": true } })),
        { "id": 2 }
    );
    assert_query!(sample.find_unique(json!({ "where": { "label": "s2", "quantity": 1 } })), null);

    Ok(())
}

#[tokio::test]
async fn filters_on_scalar_columns() -> TestResult {
    let runner = samples(4).await?;
    let db = runner.db();

    assert_query!(
        db.model("Sample").find_many(json!({
            "where": { "quantity": { "gt": 1, "lte": 3 }, "label": { "startsWith": "s" } },
            "orderBy": { "quantity": "desc" },
            "select": { "label": true }
        })),
        [{ "label": "s3" }, { "label": "s2" }]
    );

    assert_query!(
        db.model("Sample").find_many(json!({
            "where": { "OR": [{ "label": "s1" }, { "quantity": { "in": [4] } }] },
            "orderBy": { "id": "asc" },
            "select": { "id": true }
        })),
        [{ "id": 1 }, { "id": 4 }]
    );

    assert_query!(db.model("Sample").count(json!({ "where": { "tags": { "has": "x" } } })), 4);

    Ok(())
}

#[tokio::test]
async fn decimals_compare_and_sort_as_numbers() -> TestResult {
    let runner = Runner::load(schemas::scalars()).await?;
    let sample = runner.db().model("Sample");

    for (label, price) in [("ten", "10.25"), ("nine", "9.5")] {
        let mut data = sample_row(label, 1);
        data["price"] = json!(price);
        sample.create(json!({ "data": data })).await?;
    }

    assert_query!(
        sample.find_many(json!({ "where": { "price": { "gt": "9.6" } }, "select": { "label": true } })),
        [{ "label": "ten" }]
    );

    assert_query!(
        sample.find_many(json!({ "orderBy": { "price": "asc" }, "select": { "label": true } })),
        [{ "label": "nine" }, { "label": "ten" }]
    );

    assert_query!(
        sample.aggregate(json!({ "_max": { "price": true }, "_min": { "price": true } })),
        { "_max": { "price": "10.25" }, "_min": { "price": "9.5" } }
    );

    Ok(())
}

#[tokio::test]
async fn the_smallest_negative_take_reads_every_row() -> TestResult {
    let runner = samples(3).await?;

    assert_query!(
        runner.db().model("Sample").find_many(json!({
            "orderBy": { "id": "asc" },
            "take": i64::MIN,
            "select": { "id": true }
        })),
        [{ "id": 1 }, { "id": 2 }, { "id": 3 }]
    );

    Ok(())
}
