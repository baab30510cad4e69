//! Read-side aggregation queries.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Timelike, Utc};
use rusqlite::{params, params_from_iter};

use super::{from_millis, to_millis, Result, SpatialStore};
use crate::domain::{Analytics, HourlyActivity, MapAnalytics, TransitionStat};

impl SpatialStore {
    /// System-wide analytics as of `now`.
    pub fn analytics(&self, now: DateTime<Utc>) -> Result<Analytics> {
        let transitions = self.list_transitions()?;

        let (total_tracks, active_tracks, first_seen) = {
            let conn = self.conn.lock();
            let (total, active): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(state = 'active'), 0) FROM global_tracks",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let mut stmt = conn.prepare("SELECT first_seen FROM global_tracks WHERE first_seen > ?1")?;
            let since = to_millis(now - Duration::hours(24));
            let first_seen = stmt
                .query_map(params![since], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            (total, active, first_seen)
        };

        let mut buckets = [0u64; 24];
        for ms in first_seen {
            buckets[from_millis(ms).hour() as usize] += 1;
        }

        let total_handoffs: u64 = transitions.iter().map(|t| t.total_handoffs).sum();
        let successful_handoffs: u64 = transitions.iter().map(|t| t.successful_handoffs).sum();
        let overall_success_rate = if total_handoffs > 0 {
            successful_handoffs as f64 / total_handoffs as f64
        } else {
            0.0
        };

        let transition_stats = transitions
            .into_iter()
            .filter(|t| t.total_handoffs > 0)
            .map(|t| TransitionStat {
                transition_id: t.id,
                from_camera_id: t.from_camera_id,
                to_camera_id: t.to_camera_id,
                transition_type: t.transition_type,
                total_handoffs: t.total_handoffs,
                success_rate: t.success_rate,
                avg_transit_time: t.avg_transit_time,
            })
            .collect();

        Ok(Analytics {
            total_tracks: total_tracks.max(0) as u64,
            active_tracks: active_tracks.max(0) as u64,
            total_handoffs,
            successful_handoffs,
            overall_success_rate,
            transition_stats,
            hourly_activity: buckets
                .iter()
                .enumerate()
                .map(|(hour, count)| HourlyActivity {
                    hour: hour as u32,
                    track_count: *count,
                })
                .collect(),
        })
    }

    /// Analytics for the cameras placed on one map.
    pub fn map_analytics(&self, map_id: &str) -> Result<MapAnalytics> {
        let cameras: Vec<String> = self
            .list_placements_by_map(map_id)?
            .into_iter()
            .map(|p| p.camera_id)
            .collect();
        if cameras.is_empty() {
            return Ok(MapAnalytics::default());
        }

        let (total_tracks, active_tracks): (i64, i64) = {
            let conn = self.conn.lock();
            let placeholders = vec!["?"; cameras.len()].join(", ");
            conn.query_row(
                &format!(
                    "SELECT COUNT(*), COALESCE(SUM(state = 'active'), 0) FROM global_tracks \
                     WHERE current_camera_id IN ({placeholders})"
                ),
                params_from_iter(cameras.iter()),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
        };

        let on_map: HashSet<&str> = cameras.iter().map(String::as_str).collect();
        let transitions = self.list_transitions()?;
        let touching: Vec<_> = transitions
            .iter()
            .filter(|t| on_map.contains(t.from_camera_id.as_str()) || on_map.contains(t.to_camera_id.as_str()))
            .collect();

        let total_handoffs: u64 = touching.iter().map(|t| t.total_handoffs).sum();
        let successful_handoffs: u64 = touching.iter().map(|t| t.successful_handoffs).sum();

        let learned: Vec<f64> = touching
            .iter()
            .filter(|t| t.successful_handoffs > 0)
            .map(|t| t.avg_transit_time)
            .collect();
        let average_transit_time = if learned.is_empty() {
            0.0
        } else {
            learned.iter().sum::<f64>() / learned.len() as f64
        };

        let connected: HashSet<&str> = transitions
            .iter()
            .flat_map(|t| [t.from_camera_id.as_str(), t.to_camera_id.as_str()])
            .collect();
        let coverage_gaps = cameras
            .iter()
            .filter(|c| !connected.contains(c.as_str()))
            .cloned()
            .collect();

        Ok(MapAnalytics {
            active_tracks: active_tracks.max(0) as u64,
            total_tracks: total_tracks.max(0) as u64,
            successful_handoffs,
            failed_handoffs: total_handoffs.saturating_sub(successful_handoffs),
            total_handoffs,
            average_transit_time,
            coverage_gaps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CameraPlacement, CameraTransition, DetectionEvent, GlobalTrack, SpatialMap, TransitionType};
    use crate::geometry::Point;

    #[test]
    fn test_empty_analytics() {
        let store = SpatialStore::in_memory().unwrap();
        let analytics = store.analytics(Utc::now()).unwrap();
        assert_eq!(analytics.total_tracks, 0);
        assert_eq!(analytics.overall_success_rate, 0.0);
        assert!(analytics.transition_stats.is_empty());
        assert_eq!(analytics.hourly_activity.len(), 24);
    }

    #[test]
    fn test_analytics_counts() {
        let store = SpatialStore::in_memory().unwrap();
        let now = Utc::now();
        let track = GlobalTrack::start(&DetectionEvent::new("cam-1", "t1", "person", now));
        store.save_track(&track).unwrap();

        let t = store
            .create_transition(CameraTransition::new("cam-1", "cam-2", TransitionType::Gap))
            .unwrap();
        store
            .create_transition(CameraTransition::new("cam-2", "cam-3", TransitionType::Gap))
            .unwrap();
        store.record_handoff(&t.id, 4.0, true).unwrap();
        store.record_handoff(&t.id, 0.0, false).unwrap();

        let analytics = store.analytics(now).unwrap();
        assert_eq!(analytics.total_tracks, 1);
        assert_eq!(analytics.active_tracks, 1);
        assert_eq!(analytics.total_handoffs, 2);
        assert_eq!(analytics.overall_success_rate, 0.5);
        assert_eq!(analytics.transition_stats.len(), 1);
        let hour = now.hour() as usize;
        assert_eq!(analytics.hourly_activity[hour].track_count, 1);
    }

    #[test]
    fn test_map_analytics() {
        let store = SpatialStore::in_memory().unwrap();
        let map = store.create_map(SpatialMap::new("F1", 100.0, 100.0, 1.0)).unwrap();
        for (cam, x) in [("cam-1", 0.0), ("cam-2", 50.0), ("cam-9", 90.0)] {
            store
                .create_placement(CameraPlacement::new(cam, &map.id, Point::new(x, 0.0), 0.0, 60.0, 30.0))
                .unwrap();
        }
        let t = store
            .create_transition(CameraTransition::new("cam-1", "cam-2", TransitionType::Gap))
            .unwrap();
        store.record_handoff(&t.id, 6.0, true).unwrap();
        store.record_handoff(&t.id, 0.0, false).unwrap();
        store
            .save_track(&GlobalTrack::start(&DetectionEvent::new("cam-2", "t9", "car", Utc::now())))
            .unwrap();

        let stats = store.map_analytics(&map.id).unwrap();
        assert_eq!(stats.total_tracks, 1);
        assert_eq!(stats.active_tracks, 1);
        assert_eq!(stats.total_handoffs, 2);
        assert_eq!(stats.failed_handoffs, 1);
        assert_eq!(stats.average_transit_time, 6.0);
        assert_eq!(stats.coverage_gaps, vec!["cam-9".to_string()]);

        let empty = store.map_analytics("no-such-map").unwrap();
        assert_eq!(empty, MapAnalytics::default());
    }
}
