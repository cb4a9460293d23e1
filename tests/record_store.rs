mod common;

use chrono::{Duration, TimeZone, Utc};
use corroscan_lib::db::{
    models::{CalibrationProfileInput, PieceTypeInput, PieceTypePatch},
    AnalysisQuery, AnalysisStatus, BatchProcessing, BatchStatus, Database, StatusSummary,
    MAX_STORED_ANALYSES, MAX_STORED_BATCHES,
};
use tempfile::tempdir;

use common::analysis;

fn open(dir: &tempfile::TempDir) -> Database {
    Database::new(dir.path().join("store.sqlite3")).unwrap()
}

#[tokio::test]
async fn keeps_newest_records_first_and_caps_retention() {
    let dir = tempdir().unwrap();
    let db = open(&dir);
    let base = Utc::now() - Duration::days(1);

    let mut dropped = Vec::new();
    for i in 0..(MAX_STORED_ANALYSES + 5) {
        let record = analysis(
            &format!("analysis-{i:03}"),
            10.0,
            AnalysisStatus::Approved,
            base + Duration::seconds(i as i64),
        );
        dropped.extend(db.insert_analysis(&record).await.unwrap());
    }
    assert_eq!(
        dropped,
        ["analysis-000", "analysis-001", "analysis-002", "analysis-003", "analysis-004"]
    );

    assert_eq!(db.count_analyses().await.unwrap(), MAX_STORED_ANALYSES);
    assert!(db.get_analysis("analysis-000").await.unwrap().is_none());
    assert!(db.get_analysis("analysis-004").await.unwrap().is_none());
    assert!(db.get_analysis("analysis-005").await.unwrap().is_some());

    let page = db
        .list_analyses(AnalysisQuery::default(), 10)
        .await
        .unwrap();
    assert_eq!(page.data[0].id, "analysis-104");
    assert_eq!(page.data[1].id, "analysis-103");
    assert!(db.analyses_initialized().await.unwrap());
}

#[tokio::test]
async fn paginates_with_defaults() {
    let dir = tempdir().unwrap();
    let db = open(&dir);
    assert!(!db.analyses_initialized().await.unwrap());

    for i in 0..25 {
        db.insert_analysis(&analysis(
            &format!("analysis-{i}"),
            5.0,
            AnalysisStatus::Approved,
            Utc::now(),
        ))
        .await
        .unwrap();
    }

    let third = db
        .list_analyses(
            AnalysisQuery {
                page: Some(3),
                limit: Some(10),
                ..AnalysisQuery::default()
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(third.total, 25);
    assert_eq!(third.total_pages, 3);
    assert_eq!(third.page, 3);
    assert_eq!(third.data.len(), 5);

    let zeroes = db
        .list_analyses(
            AnalysisQuery {
                page: Some(0),
                limit: Some(0),
                ..AnalysisQuery::default()
            },
            7,
        )
        .await
        .unwrap();
    assert_eq!(zeroes.page, 1);
    assert_eq!(zeroes.data.len(), 7);
    assert_eq!(zeroes.total_pages, 4);

    let beyond = db
        .list_analyses(
            AnalysisQuery {
                page: Some(9),
                ..AnalysisQuery::default()
            },
            10,
        )
        .await
        .unwrap();
    assert!(beyond.data.is_empty());
    assert_eq!(beyond.total, 25);

    let unreachable = db
        .list_analyses(
            AnalysisQuery {
                page: Some(usize::MAX),
                limit: Some(2),
                ..AnalysisQuery::default()
            },
            10,
        )
        .await
        .unwrap();
    assert!(unreachable.data.is_empty());
    assert_eq!(unreachable.page, usize::MAX);
    assert_eq!(unreachable.total, 25);
}

#[tokio::test]
async fn search_folds_accented_capitals() {
    let dir = tempdir().unwrap();
    let db = open(&dir);

    let mut record = analysis("analysis-1", 20.0, AnalysisStatus::Approved, Utc::now());
    record.operator = "JOÃO SILVA".into();
    record.piece_type = "Arruela Ç".into();
    db.insert_analysis(&record).await.unwrap();

    for needle in ["joão", "JOÃO", "arruela ç"] {
        let page = db
            .list_analyses(
                AnalysisQuery {
                    search: Some(needle.into()),
                    ..AnalysisQuery::default()
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1, "search {needle:?}");
    }
}

#[tokio::test]
async fn filters_by_status_operator_dates_and_search() {
    let dir = tempdir().unwrap();
    let db = open(&dir);
    let day = |d: u32| Utc.with_ymd_and_hms(2024, 5, d, 12, 0, 0).unwrap();

    let mut first = analysis("analysis-a", 12.0, AnalysisStatus::Approved, day(1));
    first.original_filename = "PARAFUSO_01.jpg".into();
    let mut second = analysis("analysis-b", 45.0, AnalysisStatus::Inspection, day(2));
    second.operator = "Night Shift".into();
    let mut third = analysis("analysis-c", 80.0, AnalysisStatus::Rejected, day(3));
    third.piece_type = "Flat Washer".into();
    for record in [&first, &second, &third] {
        db.insert_analysis(record).await.unwrap();
    }

    let rejected = db
        .list_analyses(
            AnalysisQuery {
                status: Some(AnalysisStatus::Rejected),
                ..AnalysisQuery::default()
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(rejected.total, 1);
    assert_eq!(rejected.data[0].id, "analysis-c");

    let by_operator = db
        .list_analyses(
            AnalysisQuery {
                operator: Some("Night Shift".into()),
                ..AnalysisQuery::default()
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(by_operator.total, 1);
    assert_eq!(by_operator.data[0].id, "analysis-b");

    let searched = db
        .list_analyses(
            AnalysisQuery {
                search: Some("parafuso".into()),
                ..AnalysisQuery::default()
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(searched.total, 1);
    assert_eq!(searched.data[0].id, "analysis-a");

    let washer = db
        .list_analyses(
            AnalysisQuery {
                search: Some("  WASHER ".into()),
                ..AnalysisQuery::default()
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(washer.data[0].id, "analysis-c");

    let inclusive = db
        .list_analyses(
            AnalysisQuery {
                date_from: Some(day(2)),
                date_to: Some(day(3)),
                ..AnalysisQuery::default()
            },
            10,
        )
        .await
        .unwrap();
    let ids: Vec<_> = inclusive.data.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["analysis-c", "analysis-b"]);

    let combined = db
        .list_analyses(
            AnalysisQuery {
                status: Some(AnalysisStatus::Approved),
                date_from: Some(day(2)),
                ..AnalysisQuery::default()
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(combined.total, 0);
    assert_eq!(combined.total_pages, 0);
}

#[tokio::test]
async fn status_updates_stamp_and_clear_approval() {
    let dir = tempdir().unwrap();
    let db = open(&dir);
    let created = Utc::now() - Duration::hours(2);
    db.insert_analysis(&analysis(
        "analysis-x",
        50.0,
        AnalysisStatus::Inspection,
        created,
    ))
    .await
    .unwrap();

    let approved = db
        .update_analysis_status(
            "analysis-x",
            AnalysisStatus::Approved,
            Some("Cleaned and re-checked".into()),
            "Supervisor",
        )
        .await
        .unwrap();
    assert_eq!(approved.status, AnalysisStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some("Supervisor"));
    assert!(approved.approved_at.is_some());
    assert_eq!(approved.notes.as_deref(), Some("Cleaned and re-checked"));
    assert!(approved.updated_at > created);
    assert_eq!(approved.corrosion_percentage, 50.0);

    let rejected = db
        .update_analysis_status("analysis-x", AnalysisStatus::Rejected, None, "Supervisor")
        .await
        .unwrap();
    assert!(rejected.approved_at.is_none());
    assert!(rejected.approved_by.is_none());
    assert!(rejected.notes.is_none());

    let missing = db
        .update_analysis_status("analysis-nope", AnalysisStatus::Approved, None, "x")
        .await
        .unwrap_err();
    assert!(missing.to_string().contains("analysis not found"));
}

fn batch(id: &str) -> BatchProcessing {
    let now = Utc::now();
    BatchProcessing {
        id: id.to_string(),
        name: format!("Batch {id}"),
        total_files: 2,
        processed_files: 0,
        failed_files: 0,
        status: BatchStatus::Processing,
        analyses: Vec::new(),
        created_at: now,
        updated_at: now,
        average_corrosion: None,
        summary: None,
    }
}

#[tokio::test]
async fn batches_track_progress_and_retention() {
    let dir = tempdir().unwrap();
    let db = open(&dir);

    db.insert_batch(&batch("batch-main")).await.unwrap();
    let mut member = analysis("analysis-m", 20.0, AnalysisStatus::Approved, Utc::now());
    member.batch_id = Some("batch-main".into());
    db.insert_analysis(&member).await.unwrap();
    db.update_batch_progress("batch-main", 2, 1).await.unwrap();

    let summary = StatusSummary {
        approved: 1,
        inspection: 0,
        rejected: 0,
    };
    let finished = db
        .finish_batch("batch-main", BatchStatus::Error, Some(20.0), summary)
        .await
        .unwrap();
    assert_eq!(finished.status, BatchStatus::Error);
    assert_eq!(finished.processed_files, 2);
    assert_eq!(finished.failed_files, 1);
    assert_eq!(finished.summary, Some(summary));

    let loaded = db.get_batch("batch-main").await.unwrap().unwrap();
    assert_eq!(loaded.analyses.len(), 1);
    assert_eq!(loaded.analyses[0].id, "analysis-m");

    for i in 0..MAX_STORED_BATCHES {
        db.insert_batch(&batch(&format!("batch-{i}"))).await.unwrap();
    }
    let batches = db.list_batches().await.unwrap();
    assert_eq!(batches.len(), MAX_STORED_BATCHES);
    assert_eq!(batches[0].id, format!("batch-{}", MAX_STORED_BATCHES - 1));
    assert!(db.get_batch("batch-main").await.unwrap().is_none());
    assert!(db.update_batch_progress("batch-main", 1, 0).await.is_err());
}

fn profile(name: &str, is_default: bool) -> CalibrationProfileInput {
    CalibrationProfileInput {
        name: name.to_string(),
        description: None,
        pixels_per_mm: 12.5,
        reference_image_url: None,
        is_default,
    }
}

#[tokio::test]
async fn single_default_calibration_profile() {
    let dir = tempdir().unwrap();
    let db = open(&dir);

    let first = db.create_calibration_profile(profile("Bench A", false)).await.unwrap();
    assert!(first.is_default);
    let second = db.create_calibration_profile(profile("Bench B", false)).await.unwrap();
    assert!(!second.is_default);
    let third = db.create_calibration_profile(profile("Bench C", true)).await.unwrap();
    assert!(third.is_default);

    let defaults: Vec<_> = db
        .list_calibration_profiles()
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.is_default)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, third.id);

    db.set_default_calibration_profile(&second.id).await.unwrap();
    let current = db.get_default_calibration_profile().await.unwrap().unwrap();
    assert_eq!(current.id, second.id);
    assert!(!db.get_calibration_profile(&third.id).await.unwrap().unwrap().is_default);

    let mut invalid = profile("Broken", false);
    invalid.pixels_per_mm = 0.0;
    assert!(db.create_calibration_profile(invalid).await.is_err());
    assert!(db.set_default_calibration_profile("cal_missing").await.is_err());

    db.delete_calibration_profile(&first.id).await.unwrap();
    assert!(db.get_calibration_profile(&first.id).await.unwrap().is_none());
}

#[tokio::test]
async fn piece_types_are_seeded_and_editable() {
    let dir = tempdir().unwrap();
    let db = open(&dir);

    let seeded = db.list_piece_types().await.unwrap();
    let codes: Vec<_> = seeded.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(codes, vec!["AL", "PC10", "PM8", "PP"]);

    let created = db
        .create_piece_type(PieceTypeInput {
            code: "PS12".into(),
            name: "Stud M12".into(),
            description: Some("Threaded stud".into()),
            tolerance_percentage: 25.0,
            category: Some("studs".into()),
        })
        .await
        .unwrap();
    assert!(created.id.starts_with("pt_"));

    let duplicate = db
        .create_piece_type(PieceTypeInput {
            code: "PS12".into(),
            name: "Another".into(),
            description: None,
            tolerance_percentage: 10.0,
            category: None,
        })
        .await;
    assert!(duplicate.is_err());

    let updated = db
        .update_piece_type(
            &created.id,
            PieceTypePatch {
                tolerance_percentage: Some(35.0),
                ..PieceTypePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.tolerance_percentage, 35.0);
    assert_eq!(updated.name, "Stud M12");

    assert!(db
        .update_piece_type(&created.id, PieceTypePatch::default())
        .await
        .is_err());
    assert!(db
        .update_piece_type(
            &created.id,
            PieceTypePatch {
                tolerance_percentage: Some(150.0),
                ..PieceTypePatch::default()
            },
        )
        .await
        .is_err());

    db.delete_piece_type(&created.id).await.unwrap();
    assert_eq!(db.list_piece_types().await.unwrap().len(), 4);
}

#[tokio::test]
async fn report_aggregates_follow_the_date_range() {
    let dir = tempdir().unwrap();
    let db = open(&dir);
    let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap();

    db.insert_batch(&batch("batch-r")).await.unwrap();
    let mut in_batch = analysis("analysis-1", 20.0, AnalysisStatus::Approved, at(1, 8));
    in_batch.batch_id = Some("batch-r".into());
    db.insert_analysis(&in_batch).await.unwrap();
    db.insert_analysis(&analysis("analysis-2", 40.0, AnalysisStatus::Inspection, at(1, 16)))
        .await
        .unwrap();
    db.insert_analysis(&analysis("analysis-3", 90.0, AnalysisStatus::Rejected, at(3, 9)))
        .await
        .unwrap();

    let daily = db.corrosion_over_time(None, None).await.unwrap();
    assert_eq!(daily.len(), 2);
    assert_eq!(daily[0].date.to_string(), "2024-06-01");
    assert_eq!(daily[0].average_corrosion, 30.0);
    assert_eq!(daily[0].analyses, 2);
    assert_eq!(daily[1].average_corrosion, 90.0);

    let distribution = db.status_distribution(Some(at(1, 12)), None).await.unwrap();
    assert_eq!(distribution.approved, 0);
    assert_eq!(distribution.inspection, 1);
    assert_eq!(distribution.rejected, 1);

    let by_batch = db.corrosion_by_batch(None, None).await.unwrap();
    assert_eq!(by_batch.len(), 1);
    assert_eq!(by_batch[0].batch_name, "Batch batch-r");
    assert_eq!(by_batch[0].analyses, 1);
}
