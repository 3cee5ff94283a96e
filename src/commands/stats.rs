//! Statistics command implementations

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{DailyActivity, DateRange, Db, TopicActivity};
use crate::topics::{TopicPercentage, TopicStatistics, WeightedTopicPercentage};
use chrono::NaiveDate;
use serde::Serialize;

/// Per-student topic breakdown
#[derive(Debug, Clone, Serialize)]
pub struct StudentStatsResult {
    pub student_id: i64,
    pub course_id: i64,
    pub topics: Vec<TopicPercentage>,
}

/// Weighted breakdown over a set of students
#[derive(Debug, Clone, Serialize)]
pub struct AggregateStatsResult {
    pub scope: String,
    pub topics: Vec<WeightedTopicPercentage>,
}

pub async fn cmd_student_stats(
    config: &Config,
    db: &Db,
    student_id: i64,
    course_id: i64,
    range: DateRange,
) -> Result<StudentStatsResult> {
    let stats = TopicStatistics::new(db.clone(), config.stats.clone());
    let topics = stats
        .student_topic_percentages(student_id, course_id, range)
        .await?;
    Ok(StudentStatsResult {
        student_id,
        course_id,
        topics,
    })
}

pub async fn cmd_group_stats(
    config: &Config,
    db: &Db,
    group_id: i64,
    range: DateRange,
) -> Result<AggregateStatsResult> {
    let stats = TopicStatistics::new(db.clone(), config.stats.clone());
    let topics = stats.group_topic_percentages(group_id, range).await?;
    Ok(AggregateStatsResult {
        scope: format!("group {}", group_id),
        topics,
    })
}

pub async fn cmd_course_stats(
    config: &Config,
    db: &Db,
    course_id: i64,
    range: DateRange,
) -> Result<AggregateStatsResult> {
    db.get_course(course_id)
        .await?
        .ok_or(Error::CourseNotFound(course_id))?;
    let stats = TopicStatistics::new(db.clone(), config.stats.clone());
    let topics = stats.course_topic_percentages(course_id, range).await?;
    Ok(AggregateStatsResult {
        scope: format!("course {}", course_id),
        topics,
    })
}

pub async fn cmd_activity(
    config: &Config,
    db: &Db,
    course_id: i64,
    range: DateRange,
) -> Result<Vec<DailyActivity>> {
    let stats = TopicStatistics::new(db.clone(), config.stats.clone());
    stats.activity_summary(course_id, range).await
}

pub async fn cmd_top_topics(
    config: &Config,
    db: &Db,
    course_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TopicActivity>> {
    let stats = TopicStatistics::new(db.clone(), config.stats.clone());
    stats.top_topics_in_range(course_id, start, end).await
}

pub fn print_student_stats(result: &StudentStatsResult) {
    println!(
        "\nTopic breakdown for student {} in course {}:\n",
        result.student_id, result.course_id
    );
    if result.topics.is_empty() {
        println!("No classified activity in this period.");
        return;
    }
    for t in &result.topics {
        println!("  {:5.1}%  {} ({} messages)", t.percentage, t.topic, t.count);
    }
}

pub fn print_aggregate_stats(result: &AggregateStatsResult) {
    println!("\nTopic breakdown for {}:\n", result.scope);
    if result.topics.is_empty() {
        println!("No classified activity in this period.");
        return;
    }
    for t in &result.topics {
        println!("  {:5.1}%  {}", t.percentage, t.topic);
    }
}

pub fn print_activity(rows: &[DailyActivity]) {
    if rows.is_empty() {
        println!("No activity in this period.");
        return;
    }
    println!("\n{:<12} {:>9} {:>9} {:>7}", "date", "messages", "students", "topics");
    for row in rows {
        println!(
            "{:<12} {:>9} {:>9} {:>7}",
            row.date, row.total_messages, row.unique_students, row.unique_topics
        );
    }
}

pub fn print_top_topics(rows: &[TopicActivity]) {
    if rows.is_empty() {
        println!("No activity in this period.");
        return;
    }
    for (i, row) in rows.iter().enumerate() {
        println!(
            "{}. {} ({} messages from {} students)",
            i + 1,
            row.topic,
            row.total_count,
            row.unique_students
        );
    }
}
