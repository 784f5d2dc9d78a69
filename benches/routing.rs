// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for folder classification and document routing.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use elixir_ls_client::lsp::{DocumentSelector, TextDocument};
use elixir_ls_client::terminal_links::find_links;
use elixir_ls_client::workspace::{Workspace, WorkspaceTracker};

/// Umbrella with `apps` nested folders, all opened as workspace folders.
fn umbrella(root: &Path, apps: usize) -> Arc<Workspace> {
    fs::write(root.join("mix.exs"), "").unwrap();
    let workspace = Arc::new(Workspace::new());
    workspace.add_folder_path(root).unwrap();
    for i in 0..apps {
        let app = root.join(format!("apps/app_{}", i));
        fs::create_dir_all(app.join("lib")).unwrap();
        fs::write(app.join("mix.exs"), "").unwrap();
        workspace.add_folder_path(&app).unwrap();
    }
    workspace
}

fn bench_outermost_folder(c: &mut Criterion) {
    let mut group = c.benchmark_group("workspace_outermost");
    let temp = tempfile::TempDir::new().unwrap();
    let workspace = umbrella(temp.path(), 50);
    let tracker = WorkspaceTracker::new(Arc::clone(&workspace));
    let nested = workspace.folders().pop().unwrap();

    group.bench_function("nested_folder_cached", |b| {
        b.iter(|| black_box(tracker.outermost_folder(black_box(&nested)).unwrap()));
    });

    group.bench_function("nested_folder_rebuild", |b| {
        b.iter(|| {
            tracker.handle_did_change_workspace_folders();
            black_box(tracker.outermost_folder(black_box(&nested)).unwrap())
        });
    });

    let uri = nested.uri.join("lib/app.ex").unwrap();
    group.bench_function("folder_for_uri", |b| {
        b.iter(|| black_box(workspace.folder_for_uri(black_box(&uri))));
    });

    group.finish();
}

fn bench_selector(c: &mut Criterion) {
    let mut group = c.benchmark_group("lsp_selector");
    let selector = DocumentSelector::for_folder(Path::new("/work/umbrella"), true);
    let inside = TextDocument::from_path(Path::new("/work/umbrella/apps/a/lib/a.ex")).unwrap();
    let outside = TextDocument::from_path(Path::new("/work/other/lib/b.ex")).unwrap();

    group.bench_function("match_inside", |b| {
        b.iter(|| black_box(selector.matches(black_box(&inside))));
    });
    group.bench_function("match_outside", |b| {
        b.iter(|| black_box(selector.matches(black_box(&outside))));
    });

    group.finish();
}

fn bench_terminal_links(c: &mut Criterion) {
    let temp = tempfile::TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("lib")).unwrap();
    fs::write(temp.path().join("lib/worker.ex"), "").unwrap();
    let output = "warning: variable \"x\" is unused\n  lib/worker.ex:12: Worker.run/1\n".repeat(20);

    c.bench_function("terminal_links_find", |b| {
        b.iter(|| black_box(find_links(black_box(&output), temp.path())));
    });
}

criterion_group!(benches, bench_outermost_folder, bench_selector, bench_terminal_links);
criterion_main!(benches);
