//! Shared fixtures: a generated schedule workbook plus zip helpers for
//! injecting parts the generator never writes

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use chrono::NaiveDate;
use schedboard_core::{ItemType, Level, Milestone, ProjectInfo, ScheduleData, Task, TaskStatus};
use schedboard_ingest::{ingest_bytes, Ingested, IngestOptions, Package};
use schedboard_render::sheet_xml::SheetXml;
use schedboard_render::{Renderer, TemplateGenerator};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn today() -> NaiveDate {
    date(2026, 5, 10)
}

pub fn options() -> IngestOptions {
    IngestOptions::new(today())
}

fn milestone(name: &str, item_type: ItemType, completion_pct: f64) -> Milestone {
    Milestone {
        source_row: None,
        area: String::new(),
        main_item: String::new(),
        name: name.to_string(),
        item_type,
        completion_pct,
        target_date: None,
        notes: String::new(),
    }
}

/// Five tasks across three levels and three milestones
pub fn sample_data() -> ScheduleData {
    let mut phase = Task::new("Phase 1")
        .level(Level::MAIN)
        .owner("PM")
        .with_status(TaskStatus::Going)
        .plan(Some(date(2026, 3, 2)), Some(date(2026, 4, 30)));
    phase.plan_days = 59;

    let mut rail = Task::new("Rail install")
        .owner("Mech")
        .progress(100.0)
        .target(100.0)
        .with_status(TaskStatus::Done)
        .plan(Some(date(2026, 3, 2)), Some(date(2026, 3, 20)))
        .actual(Some(date(2026, 3, 2)), Some(date(2026, 3, 19)))
        .variance(1);
    rail.plan_days = 18;
    rail.actual_days = 17;

    let mut teaching = Task::new("Vehicle teaching")
        .owner("SW")
        .progress(50.0)
        .target(75.0)
        .with_status(TaskStatus::Going)
        .plan(Some(date(2026, 4, 1)), Some(date(2026, 6, 1)))
        .notes("bay 2 first");
    teaching.plan_days = 61;
    teaching.coord_area = "Bay 2".into();

    let mut interlock = Task::new("Stocker interlock")
        .owner("SW")
        .progress(25.0)
        .target(50.0)
        .with_status(TaskStatus::Delay)
        .plan(Some(date(2026, 4, 1)), Some(date(2026, 5, 9)))
        .variance(-1);
    interlock.plan_days = 38;

    let wiring = Task::new("Wiring").level(Level::SUB_SUB).owner("Elec");

    let mut target = milestone("走行", ItemType::Main, 75.0);
    target.target_date = Some(date(2026, 5, 31));

    let mut data = ScheduleData {
        project: ProjectInfo {
            code: "P-042".into(),
            name: "Fab 3 AMHS".into(),
            lead: "Lin".into(),
            start_date: Some(date(2026, 3, 2)),
            update_date: None,
        },
        tasks: vec![phase, rail, teaching, interlock, wiring],
        milestones: vec![
            milestone("區域A", ItemType::Area, 50.0),
            target,
            milestone("踩點", ItemType::Sub, 100.0),
        ],
    };
    data.renumber();
    data
}

pub fn workbook() -> Vec<u8> {
    TemplateGenerator::new()
        .start_date(date(2026, 3, 2))
        .render(&sample_data())
        .unwrap()
}

pub fn ingest(bytes: &[u8]) -> Ingested {
    ingest_bytes(bytes, &options()).unwrap()
}

/// Parsed worksheet XML of a named sheet
pub fn sheet_xml(bytes: &[u8], sheet: &str) -> SheetXml {
    let mut package = Package::open(bytes).unwrap();
    let part = package.sheet_path(sheet).unwrap().unwrap();
    SheetXml::parse(&package.read_part(&part).unwrap(), &part).unwrap()
}

/// Every part of a package, by name
pub fn parts(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut parts = Vec::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).unwrap();
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        parts.push((file.name().to_string(), content));
    }
    parts
}

/// Rebuild a package with one part rewritten and optional parts added
pub fn rewrite(bytes: &[u8], edit: impl Fn(&str, String) -> String, added: &[(&str, &str)]) -> Vec<u8> {
    let mut out = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts(bytes) {
        let content = match String::from_utf8(content) {
            Ok(text) => edit(&name, text).into_bytes(),
            Err(err) => err.into_bytes(),
        };
        out.start_file(name, SimpleFileOptions::default()).unwrap();
        out.write_all(&content).unwrap();
    }
    for (name, content) in added {
        out.start_file(*name, SimpleFileOptions::default()).unwrap();
        out.write_all(content.as_bytes()).unwrap();
    }
    out.finish().unwrap().into_inner()
}
