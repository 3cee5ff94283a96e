//! Course, group, topic, and enrollment management commands

use crate::error::{Error, Result};
use crate::store::{ChatSession, Course, CourseTopic, Db, Group};
use tracing::info;

pub async fn cmd_add_course(db: &Db, name: &str) -> Result<Course> {
    let course = db.insert_course(name).await?;
    info!("Created course '{}' (id {})", course.name, course.id);
    Ok(course)
}

pub async fn cmd_add_group(db: &Db, course_id: i64, name: &str) -> Result<Group> {
    require_course(db, course_id).await?;
    let group = db.insert_group(course_id, name).await?;
    info!("Created group '{}' (id {}) in course {}", group.name, group.id, course_id);
    Ok(group)
}

pub async fn cmd_add_topic(
    db: &Db,
    course_id: i64,
    name: &str,
    description: Option<&str>,
    keywords: Option<&str>,
) -> Result<CourseTopic> {
    require_course(db, course_id).await?;
    let topic = db
        .insert_topic(course_id, name, description, keywords, true)
        .await?;
    info!("Created topic '{}' (id {}) in course {}", topic.name, topic.id, course_id);
    Ok(topic)
}

pub async fn cmd_enroll(
    db: &Db,
    student_id: i64,
    course_id: i64,
    group_id: Option<i64>,
) -> Result<()> {
    require_course(db, course_id).await?;
    if let Some(group_id) = group_id {
        let group = db
            .get_group(group_id)
            .await?
            .ok_or_else(|| Error::Config(format!("Group {} does not exist", group_id)))?;
        if group.course_id != course_id {
            return Err(Error::Config(format!(
                "Group {} belongs to course {}, not {}",
                group_id, group.course_id, course_id
            )));
        }
    }
    db.insert_enrollment(student_id, group_id, course_id).await?;
    info!("Enrolled student {} in course {}", student_id, course_id);
    Ok(())
}

pub async fn cmd_new_session(
    db: &Db,
    student_id: i64,
    course_id: Option<i64>,
) -> Result<ChatSession> {
    if let Some(course_id) = course_id {
        require_course(db, course_id).await?;
    }
    let session = db.insert_session(student_id, course_id, "New Chat").await?;
    info!("Created session {} for student {}", session.id, student_id);
    Ok(session)
}

/// List a course's active topics
pub async fn cmd_list_topics(db: &Db, course_id: i64) -> Result<Vec<CourseTopic>> {
    require_course(db, course_id).await?;
    db.active_topics(course_id).await
}

pub fn print_topics(topics: &[CourseTopic]) {
    if topics.is_empty() {
        println!("No active topics.");
        return;
    }
    for topic in topics {
        print!("{}. {}", topic.id, topic.name);
        if let Some(description) = &topic.description {
            print!(" - {}", description);
        }
        println!();
        if let Some(keywords) = &topic.keywords {
            println!("   keywords: {}", keywords);
        }
    }
}

async fn require_course(db: &Db, course_id: i64) -> Result<Course> {
    db.get_course(course_id)
        .await?
        .ok_or(Error::CourseNotFound(course_id))
}
