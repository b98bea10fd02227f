#[cfg(test)]
mod tests {
    use crate::db::{
        delete_attendance_record, find_attendance_record, get_absences_for_athlete,
        get_attendance_dates, get_attendance_for_date, get_history_for_date,
        reconcile_attendance_day, toggle_attendance,
    };
    use crate::models::AttendanceStatus;
    use crate::test::test_utils::{TestDbBuilder, create_standard_test_db};

    const DAY: &str = "2026-03-02";

    #[rocket::async_test]
    async fn test_reconcile_backfills_present_rows() {
        let test_db = create_standard_test_db().await;

        let backfilled = reconcile_attendance_day(&test_db.pool, DAY, None).await.unwrap();
        assert_eq!(backfilled, 4);

        let records = get_attendance_for_date(&test_db.pool, DAY, None).await.unwrap();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.status == AttendanceStatus::Present));
    }

    #[rocket::async_test]
    async fn test_reconcile_is_idempotent_and_preserves_absences() {
        let test_db = TestDbBuilder::new()
            .team("Undercut")
            .athlete("Ava", "Jones", Some("Undercut"))
            .athlete("Ben", "Ortiz", Some("Undercut"))
            .attendance("Ava Jones", DAY, AttendanceStatus::Absent, Some("Sick"))
            .build()
            .await
            .unwrap();

        let backfilled = reconcile_attendance_day(&test_db.pool, DAY, None).await.unwrap();
        assert_eq!(backfilled, 1);

        // Repeat runs change nothing.
        assert_eq!(reconcile_attendance_day(&test_db.pool, DAY, None).await.unwrap(), 0);

        let ava = test_db.athlete_id("Ava Jones").unwrap();
        let record = find_attendance_record(&test_db.pool, ava, DAY)
            .await
            .unwrap()
            .expect("Ava's row should survive reconciliation");
        assert_eq!(record.status, AttendanceStatus::Absent);
        assert_eq!(record.note.as_deref(), Some("Sick"));

        assert_eq!(test_db.attendance_count(ava, DAY).await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn test_reconcile_scoped_to_team() {
        let test_db = create_standard_test_db().await;
        let undercut = test_db.team_id("Undercut");

        let backfilled = reconcile_attendance_day(&test_db.pool, DAY, undercut).await.unwrap();
        assert_eq!(backfilled, 2);

        let cara = test_db.athlete_id("Cara Diaz").unwrap();
        assert!(
            find_attendance_record(&test_db.pool, cara, DAY)
                .await
                .unwrap()
                .is_none(),
            "Reconciliation must not touch other teams"
        );
    }

    #[rocket::async_test]
    async fn test_toggle_flips_status() {
        let test_db = create_standard_test_db().await;
        let ava = test_db.athlete_id("Ava Jones").unwrap();

        reconcile_attendance_day(&test_db.pool, DAY, None).await.unwrap();

        let status = toggle_attendance(&test_db.pool, ava, DAY, Some("Dentist"))
            .await
            .unwrap();
        assert_eq!(status, Some(AttendanceStatus::Absent));

        let record = find_attendance_record(&test_db.pool, ava, DAY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.note.as_deref(), Some("Dentist"));

        // Toggling twice returns to the starting status.
        let status = toggle_attendance(&test_db.pool, ava, DAY, None).await.unwrap();
        assert_eq!(status, Some(AttendanceStatus::Present));

        assert_eq!(test_db.attendance_count(ava, DAY).await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn test_toggle_without_prior_row_inserts_present() {
        let test_db = create_standard_test_db().await;
        let ava = test_db.athlete_id("Ava Jones").unwrap();

        // No reconciliation ran: the mark lands as a fresh Present row
        // carrying the submitted note.
        let status = toggle_attendance(&test_db.pool, ava, DAY, Some("Late bus"))
            .await
            .unwrap();
        assert_eq!(status, Some(AttendanceStatus::Present));

        let record = find_attendance_record(&test_db.pool, ava, DAY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.note.as_deref(), Some("Late bus"));
        assert_eq!(test_db.attendance_count(ava, DAY).await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn test_toggle_unknown_athlete_is_ignored() {
        let test_db = create_standard_test_db().await;

        let status = toggle_attendance(&test_db.pool, 9999, DAY, None).await.unwrap();
        assert_eq!(status, None);

        let records = get_attendance_for_date(&test_db.pool, DAY, None).await.unwrap();
        assert!(records.is_empty());
    }

    #[rocket::async_test]
    async fn test_history_defaults_missing_rows_to_present() {
        let test_db = TestDbBuilder::new()
            .team("Undercut")
            .athlete("Ava", "Jones", Some("Undercut"))
            .athlete("Ben", "Ortiz", Some("Undercut"))
            .attendance("Ava Jones", DAY, AttendanceStatus::Absent, None)
            .build()
            .await
            .unwrap();

        let rows = get_history_for_date(&test_db.pool, DAY, None).await.unwrap();
        assert_eq!(rows.len(), 2);

        let ava = rows.iter().find(|r| r.first_name == "Ava").unwrap();
        assert_eq!(ava.status, AttendanceStatus::Absent);

        let ben = rows.iter().find(|r| r.first_name == "Ben").unwrap();
        assert_eq!(ben.status, AttendanceStatus::Present);

        // The display default is not persisted.
        let ben_id = test_db.athlete_id("Ben Ortiz").unwrap();
        assert_eq!(test_db.attendance_count(ben_id, DAY).await.unwrap(), 0);
    }

    #[rocket::async_test]
    async fn test_attendance_dates_are_distinct_and_descending() {
        let test_db = TestDbBuilder::new()
            .team("Undercut")
            .athlete("Ava", "Jones", Some("Undercut"))
            .athlete("Ben", "Ortiz", Some("Undercut"))
            .attendance("Ava Jones", "2026-03-01", AttendanceStatus::Present, None)
            .attendance("Ben Ortiz", "2026-03-01", AttendanceStatus::Absent, None)
            .attendance("Ava Jones", "2026-03-02", AttendanceStatus::Present, None)
            .build()
            .await
            .unwrap();

        let dates = get_attendance_dates(&test_db.pool).await.unwrap();
        assert_eq!(dates, vec!["2026-03-02".to_string(), "2026-03-01".to_string()]);
    }

    #[rocket::async_test]
    async fn test_delete_absence_record() {
        let test_db = TestDbBuilder::new()
            .team("Undercut")
            .athlete("Ava", "Jones", Some("Undercut"))
            .attendance("Ava Jones", "2026-03-01", AttendanceStatus::Absent, Some("Flu"))
            .attendance("Ava Jones", "2026-03-02", AttendanceStatus::Absent, None)
            .build()
            .await
            .unwrap();

        let ava = test_db.athlete_id("Ava Jones").unwrap();

        let absences = get_absences_for_athlete(&test_db.pool, ava).await.unwrap();
        assert_eq!(absences.len(), 2);

        delete_attendance_record(&test_db.pool, absences[0].id).await.unwrap();

        let remaining = get_absences_for_athlete(&test_db.pool, ava).await.unwrap();
        assert_eq!(remaining.len(), 1);
    }
}
