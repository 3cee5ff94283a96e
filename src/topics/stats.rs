//! Weighted topic-percentage analytics
//!
//! Per-student percentages are the base computation; group and course
//! breakdowns re-weight every active student equally so that a student
//! with two messages counts as much as one with two hundred.

use crate::config::StatsConfig;
use crate::error::Result;
use crate::store::{DailyActivity, DateRange, Db, TopicActivity};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// One topic's share of a student's classified messages
#[derive(Debug, Clone, Serialize)]
pub struct TopicPercentage {
    pub topic: String,
    pub count: i64,
    pub percentage: f64,
}

/// One topic's share of a group/course aggregate
#[derive(Debug, Clone, Serialize)]
pub struct WeightedTopicPercentage {
    pub topic: String,
    pub weighted_total: f64,
    pub percentage: f64,
}

/// Topic statistics service
pub struct TopicStatistics {
    db: Db,
    config: StatsConfig,
}

impl TopicStatistics {
    pub fn new(db: Db, config: StatsConfig) -> Self {
        Self { db, config }
    }

    /// Percentages per topic for one student in one course. The base for
    /// every aggregate. Empty when the student has no classified messages
    /// in range; otherwise percentages sum to 100.
    pub async fn student_topic_percentages(
        &self,
        student_id: i64,
        course_id: i64,
        range: DateRange,
    ) -> Result<Vec<TopicPercentage>> {
        let counts = self
            .db
            .student_topic_counts(student_id, course_id, range)
            .await?;

        let total: i64 = counts.iter().map(|c| c.count).sum();
        if total == 0 {
            return Ok(Vec::new());
        }

        Ok(counts
            .into_iter()
            .map(|c| TopicPercentage {
                topic: c.topic,
                count: c.count,
                percentage: (c.count as f64 / total as f64) * 100.0,
            })
            .collect())
    }

    /// Aggregate percentages for the students of a group.
    pub async fn group_topic_percentages(
        &self,
        group_id: i64,
        range: DateRange,
    ) -> Result<Vec<WeightedTopicPercentage>> {
        let Some(group) = self.db.get_group(group_id).await? else {
            return Ok(Vec::new());
        };
        let students = self.db.group_students(group_id).await?;
        self.weighted_percentages(&students, group.course_id, range)
            .await
    }

    /// Aggregate percentages for every student enrolled in a course.
    pub async fn course_topic_percentages(
        &self,
        course_id: i64,
        range: DateRange,
    ) -> Result<Vec<WeightedTopicPercentage>> {
        let students = self.db.course_students(course_id).await?;
        self.weighted_percentages(&students, course_id, range).await
    }

    /// Equal-weight-per-active-student aggregation: each student with any
    /// activity contributes exactly `student_weight` to the denominator,
    /// split across topics by their personal percentage breakdown.
    /// Students with zero activity are excluded entirely.
    async fn weighted_percentages(
        &self,
        students: &[i64],
        course_id: i64,
        range: DateRange,
    ) -> Result<Vec<WeightedTopicPercentage>> {
        if students.is_empty() {
            return Ok(Vec::new());
        }

        let student_weight = self.config.student_weight;
        let mut topic_totals: BTreeMap<String, f64> = BTreeMap::new();
        let mut total_weight = 0.0;

        for &student_id in students {
            let percentages = self
                .student_topic_percentages(student_id, course_id, range)
                .await?;
            if percentages.is_empty() {
                continue;
            }

            total_weight += student_weight;
            for entry in percentages {
                let weighted_value = (entry.percentage / 100.0) * student_weight;
                *topic_totals.entry(entry.topic).or_insert(0.0) += weighted_value;
            }
        }

        if total_weight == 0.0 {
            return Ok(Vec::new());
        }

        let mut rows: Vec<WeightedTopicPercentage> = topic_totals
            .into_iter()
            .map(|(topic, weighted_total)| WeightedTopicPercentage {
                percentage: (weighted_total / total_weight) * 100.0,
                topic,
                weighted_total,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.weighted_total
                .total_cmp(&a.weighted_total)
                .then_with(|| a.topic.cmp(&b.topic))
        });
        Ok(rows)
    }

    /// Per-day message/student/topic totals for a course.
    pub async fn activity_summary(
        &self,
        course_id: i64,
        range: DateRange,
    ) -> Result<Vec<DailyActivity>> {
        self.db.daily_activity(course_id, range).await
    }

    /// Topics ordered by total message count over an inclusive date range,
    /// annotated with distinct-student counts.
    pub async fn top_topics_in_range(
        &self,
        course_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TopicActivity>> {
        self.db.topic_activity(course_id, start, end).await
    }
}
