//! End-to-end scheduling runs against HiGHS.

use std::collections::{BTreeMap, HashMap};

use student_scheduler::config::SchedulerConfig;
use student_scheduler::data::{
    CatalogInput, Course, Enrollment, PrimaryChoice, SchedulingInput, SolveStatus, Student,
};
use student_scheduler::error::ScheduleError;
use student_scheduler::interpret::ScheduleReport;
use student_scheduler::schedule;
use student_scheduler::solver::HighsBackend;
use student_scheduler::weights::{MultiSlotPolicy, RequiredOverlap, WeightConfig};

fn course(id: &str, slots: &[&str], capacity: u32) -> Course {
    Course {
        id: id.to_string(),
        time_slots: slots.iter().map(|s| s.to_string()).collect(),
        capacity,
        grade_weight: BTreeMap::new(),
    }
}

fn input(courses: Vec<Course>, students: Vec<Student>) -> SchedulingInput {
    SchedulingInput {
        catalog: CatalogInput {
            courses,
            time_slots: (1..=8).map(|p| format!("Period {p}")).collect(),
            grades: vec!["9th".into(), "10th".into(), "11th".into(), "12th".into()],
        },
        students,
        weighting: None,
    }
}

fn run(input: SchedulingInput) -> Result<ScheduleReport, ScheduleError> {
    schedule(input, &SchedulerConfig::default(), &HighsBackend::default())
}

fn enrollment(course: &str, slot: &str) -> Enrollment {
    Enrollment {
        course_id: course.into(),
        time_slot: slot.into(),
    }
}

#[test]
fn over_capacity_required_course_is_infeasible() {
    let err = run(input(
        vec![course("Math", &["Period 1"], 1)],
        vec![
            Student::new(1, "9th").requiring(["Math"]),
            Student::new(2, "10th").requiring(["Math"]),
        ],
    ))
    .unwrap_err();

    match err {
        ScheduleError::Infeasible(msg) => assert!(msg.contains("Math"), "{msg}"),
        other => panic!("expected infeasible, got {other}"),
    }
}

#[test]
fn single_primary_preference_is_granted() {
    let report = run(input(
        vec![course("Art", &["Period 2"], 20)],
        vec![Student::new(1, "11th").preferring(PrimaryChoice::new("Art"))],
    ))
    .unwrap();

    assert_eq!(report.status, SolveStatus::Optimal);
    assert!((report.objective_value - 1.0).abs() < 1e-6);
    let schedule = report.schedule_of(1).unwrap();
    assert_eq!(schedule.enrollments, vec![enrollment("Art", "Period 2")]);
    assert!(schedule.unmet_preferences.is_empty());
}

#[test]
fn required_and_preferences_all_fit() {
    let report = run(input(
        vec![
            course("Math", &["Period 1"], 30),
            course("Art", &["Period 2"], 20),
            course("Music", &["Period 3"], 20),
        ],
        vec![
            Student::new(1, "9th")
                .requiring(["Math"])
                .preferring(PrimaryChoice::new("Art").with_backups(["Music"])),
        ],
    ))
    .unwrap();

    assert!(report.objective_value >= 1001.0 - 1e-6);
    let schedule = report.schedule_of(1).unwrap();
    assert!(schedule.enrollments.contains(&enrollment("Math", "Period 1")));
    assert!(schedule.enrollments.contains(&enrollment("Art", "Period 2")));
}

#[test]
fn capacity_pressure_falls_back_to_backup() {
    let report = run(input(
        vec![
            course("Art", &["Period 1"], 1),
            course("Music", &["Period 2"], 5),
        ],
        vec![
            Student::new(1, "9th").preferring(PrimaryChoice::new("Art").with_backups(["Music"])),
            Student::new(2, "9th").preferring(PrimaryChoice::new("Art").with_backups(["Music"])),
        ],
    ))
    .unwrap();

    // backups are not excluded by the primary, so both students hold Music
    assert!((report.objective_value - 2.0).abs() < 1e-6);
    let art_holders = report
        .schedules
        .iter()
        .filter(|s| s.enrollments.contains(&enrollment("Art", "Period 1")))
        .count();
    assert_eq!(art_holders, 1);
    let unmet: Vec<_> = report
        .schedules
        .iter()
        .flat_map(|s| s.unmet_preferences.iter())
        .collect();
    assert_eq!(unmet.len(), 1);
    assert_eq!(unmet[0].granted_backup.as_deref(), Some("Music"));
}

#[test]
fn clashing_preferences_pick_the_heavier() {
    let mut art = course("Art", &["Period 1"], 20);
    art.grade_weight.insert("12th".into(), 4.0);
    let report = run(input(
        vec![art, course("Drama", &["Period 1"], 20)],
        vec![
            Student::new(1, "12th")
                .preferring(PrimaryChoice::new("Drama"))
                .preferring(PrimaryChoice::new("Art")),
        ],
    ))
    .unwrap();

    assert!((report.objective_value - 4.0).abs() < 1e-6);
    let schedule = report.schedule_of(1).unwrap();
    assert_eq!(schedule.enrollments, vec![enrollment("Art", "Period 1")]);
    assert_eq!(schedule.unmet_preferences[0].course_id, "Drama");
}

#[test]
fn overlap_policy_controls_double_counting() {
    let students = vec![
        Student::new(1, "9th")
            .requiring(["Math"])
            .preferring(PrimaryChoice::new("Math")),
    ];
    let courses = vec![course("Math", &["Period 1"], 30)];

    let report = run(input(courses.clone(), students.clone())).unwrap();
    assert!((report.objective_value - 1000.0).abs() < 1e-6);

    let mut summed = input(courses, students);
    summed.weighting = Some(WeightConfig {
        overlap: RequiredOverlap::Sum,
        ..WeightConfig::default()
    });
    let report = run(summed).unwrap();
    assert!((report.objective_value - 1001.0).abs() < 1e-6);
}

#[test]
fn multi_period_required_course_policies() {
    let courses = vec![course("Science", &["Period 7", "Period 8"], 30)];
    let students = vec![Student::new(1, "10th").requiring(["Science"])];

    // one enrollment unit across the block
    let report = run(input(courses.clone(), students.clone())).unwrap();
    assert_eq!(report.schedule_of(1).unwrap().enrollments.len(), 1);

    let mut block = input(courses, students);
    block.weighting = Some(WeightConfig {
        multi_slot: MultiSlotPolicy::AllSlots,
        ..WeightConfig::default()
    });
    let report = run(block).unwrap();
    assert_eq!(
        report.schedule_of(1).unwrap().enrollments,
        vec![enrollment("Science", "Period 7"), enrollment("Science", "Period 8")]
    );
    assert!((report.objective_value - 2000.0).abs() < 1e-6);
}

#[test]
fn students_without_requests_get_empty_schedules() {
    let report = run(input(
        vec![course("Math", &["Period 1"], 30)],
        vec![Student::new(1, "9th"), Student::new(2, "12th")],
    ))
    .unwrap();
    assert_eq!(report.objective_value, 0.0);
    assert_eq!(report.schedules.len(), 2);
    assert!(report.schedules.iter().all(|s| s.enrollments.is_empty()));
}

#[test]
fn unknown_course_aborts_the_run() {
    let err = run(input(
        vec![course("Math", &["Period 1"], 30)],
        vec![Student::new(3, "9th").requiring(["Latin"])],
    ))
    .unwrap_err();
    assert!(matches!(err, ScheduleError::DataIntegrity(_)));
    assert!(err.to_string().contains("Latin"));
}

#[test]
fn invalid_weighting_is_a_config_error() {
    let mut bad = input(vec![course("Math", &["Period 1"], 30)], Vec::new());
    bad.weighting = Some(WeightConfig {
        required_weight: -5.0,
        ..WeightConfig::default()
    });
    assert!(matches!(run(bad).unwrap_err(), ScheduleError::Config(_)));
}

/// A school-sized catalog: four period pairs with four or five courses each.
fn school() -> (Vec<Course>, Vec<Student>) {
    let groups: [(&[&str], [&str; 2]); 4] = [
        (&["Math", "Art", "Drama", "French", "Algebra"][..], ["Period 1", "Period 2"]),
        (&["English", "Music", "Woodshop", "Spanish"][..], ["Period 3", "Period 4"]),
        (&["History", "PE", "Cooking", "German"][..], ["Period 5", "Period 6"]),
        (&["Science", "Coding", "Robotics", "Chinese"][..], ["Period 7", "Period 8"]),
    ];
    let grades = ["9th", "10th", "11th", "12th"];

    let mut courses = Vec::new();
    for (names, slots) in &groups {
        for (i, name) in names.iter().enumerate() {
            let mut c = course(name, slots, if i == 0 { 30 } else { 20 });
            c.grade_weight.insert(grades[i % 4].to_string(), 2.0);
            courses.push(c);
        }
    }

    let students = (0..40usize)
        .map(|i| {
            let (a, b, c, d) = (groups[0].0, groups[1].0, groups[2].0, groups[3].0);
            Student::new(i as u32 + 1, grades[i % 4])
                .requiring([a[i % 5], b[i % 4], c[(i + 1) % 4]])
                .preferring(PrimaryChoice::new(d[i % 4]).with_backups([d[(i + 1) % 4]]))
                .preferring(PrimaryChoice::new(a[(i + 2) % 5]).with_backups([b[(i + 3) % 4]]))
        })
        .collect();
    (courses, students)
}

#[test]
fn solved_school_respects_every_hard_constraint() {
    let (courses, students) = school();
    let report = run(input(courses.clone(), students.clone())).unwrap();

    let capacity: HashMap<&str, u32> = courses.iter().map(|c| (c.id.as_str(), c.capacity)).collect();
    let mut seats: HashMap<(&str, &str), u32> = HashMap::new();

    for (student, schedule) in students.iter().zip(&report.schedules) {
        assert_eq!(student.id, schedule.student_id);

        for required in &student.required_courses {
            let held = schedule
                .enrollments
                .iter()
                .filter(|e| &e.course_id == required)
                .count();
            assert_eq!(held, 1, "student {} holds {} x {}", student.id, held, required);
        }

        let mut periods: Vec<&str> = schedule.enrollments.iter().map(|e| e.time_slot.as_str()).collect();
        let total = periods.len();
        periods.sort();
        periods.dedup();
        assert_eq!(periods.len(), total, "student {} double-booked", student.id);

        for e in &schedule.enrollments {
            *seats.entry((e.course_id.as_str(), e.time_slot.as_str())).or_default() += 1;
        }
    }

    for ((course, slot), count) in seats {
        assert!(count <= capacity[course], "{course} at {slot}: {count} seats");
    }

    // every required course is worth more than all soft preferences together
    assert!(report.objective_value >= 40.0 * 3.0 * 1000.0);
}

#[test]
fn identical_inputs_give_identical_reports() {
    let (courses, students) = school();
    let first = run(input(courses.clone(), students.clone())).unwrap();
    let second = run(input(courses, students)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn time_limited_school_is_only_optimal_when_proven() {
    let (courses, students) = school();
    let best = run(input(courses.clone(), students.clone())).unwrap();

    let mut config = SchedulerConfig::default();
    config.solver.time_limit_secs = Some(1e-6);
    let backend = HighsBackend::new(config.solver.clone());
    match schedule(input(courses, students), &config, &backend) {
        Ok(report) => {
            if report.status == SolveStatus::Optimal {
                assert!((report.objective_value - best.objective_value).abs() < 1e-6);
            } else {
                assert_eq!(report.status, SolveStatus::Feasible);
                assert!(report.objective_value <= best.objective_value + 1e-6);
            }
        }
        Err(err) => assert!(matches!(err, ScheduleError::SolverUnavailable(_)), "{err}"),
    }
}

#[test]
fn preference_heavier_than_a_requirement_is_rejected() {
    let mut art = course("Art", &["Period 2"], 20);
    art.grade_weight.insert("9th".into(), 1500.0);
    let err = run(input(
        vec![course("Math", &["Period 1"], 30), art],
        vec![
            Student::new(1, "9th")
                .requiring(["Math"])
                .preferring(PrimaryChoice::new("Art")),
        ],
    ))
    .unwrap_err();

    assert!(matches!(err, ScheduleError::Config(_)));
    assert!(err.to_string().contains("Art"));
}
