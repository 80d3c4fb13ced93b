use rusqlite::{params, Connection};

use crate::model::repository::{EntryKind, EntryRecord, SubtreeFile, SubtreeFolder};
use crate::service::path_service::split_path;

/// idempotent insert; an already existing (parent, name) pair is a no-op,
/// which is what makes CREATE_FOLDER safe to repeat
pub fn add_entry(
    login: &str,
    parent_path: &str,
    logical_name: &str,
    physical_name: &str,
    kind: EntryKind,
    con: &Connection,
) -> Result<(), rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/entry/add_entry.sql"))
        .unwrap();
    pst.execute(params![login, parent_path, logical_name, physical_name, kind])?;
    Ok(())
}

/// looks up a single entry; propagates `QueryReturnedNoRows` when the path
/// has no entry so callers can map it to their own NotFound
pub fn get_entry(
    login: &str,
    parent_path: &str,
    logical_name: &str,
    con: &Connection,
) -> Result<(String, EntryKind), rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/entry/get_entry.sql"))
        .unwrap();
    pst.query_row(params![login, parent_path, logical_name], |row| {
        let physical: String = row.get(0)?;
        let kind: String = row.get(1)?;
        Ok((physical, EntryKind::from(kind.as_str())))
    })
}

/// direct children of a folder path, root included (empty parent)
pub fn get_child_entries(
    login: &str,
    parent_path: &str,
    con: &Connection,
) -> Result<Vec<EntryRecord>, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/entry/get_child_entries.sql"))
        .unwrap();
    let mapped = pst.query_map(params![login, parent_path], |row| {
        let kind: String = row.get(2)?;
        Ok(EntryRecord {
            logical_name: row.get(0)?,
            physical_name: row.get(1)?,
            kind: EntryKind::from(kind.as_str()),
            modified_date: row.get(3)?,
        })
    })?;
    let mut entries = Vec::new();
    for entry in mapped {
        entries.push(entry?);
    }
    Ok(entries)
}

/// the entry's kind plus the physical names of itself and, for folders,
/// every transitive descendant. `QueryReturnedNoRows` if the path is unknown
pub fn resolve_deletion_set(
    login: &str,
    full_path: &str,
    con: &Connection,
) -> Result<(EntryKind, Vec<String>), rusqlite::Error> {
    let (parent, name) = split_path(full_path);
    let (physical, kind) = get_entry(login, parent, name, con)?;
    let mut physical_names = vec![physical];
    if kind == EntryKind::Folder {
        let mut pst = con
            .prepare(include_str!(
                "../assets/queries/entry/get_subtree_physical_names.sql"
            ))
            .unwrap();
        let mapped = pst.query_map(params![login, full_path, like_prefix(full_path)], |row| {
            row.get::<_, String>(0)
        })?;
        for physical in mapped {
            physical_names.push(physical?);
        }
    }
    Ok((kind, physical_names))
}

/// removes the entry's own row and every row under it in one transaction;
/// a failure part way leaves all rows in place
pub fn delete_subtree(
    login: &str,
    full_path: &str,
    con: &mut Connection,
) -> Result<(), rusqlite::Error> {
    let (parent, name) = split_path(full_path);
    let tx = con.transaction()?;
    {
        let mut delete_children = tx
            .prepare(include_str!(
                "../assets/queries/entry/delete_subtree_entries.sql"
            ))
            .unwrap();
        let mut delete_own = tx
            .prepare(include_str!("../assets/queries/entry/delete_entry.sql"))
            .unwrap();
        delete_children.execute(params![login, full_path, like_prefix(full_path)])?;
        delete_own.execute(params![login, parent, name])?;
    }
    tx.commit()
}

/// bumps the modification date of every ancestor folder of the changed path,
/// so listings of enclosing folders reflect nested changes
pub fn touch_ancestors(
    login: &str,
    changed_path: &str,
    con: &Connection,
) -> Result<(), rusqlite::Error> {
    let parts: Vec<&str> = changed_path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() < 2 {
        // the changed item sits in the root, which has no row to touch
        return Ok(());
    }
    let mut pst = con
        .prepare(include_str!("../assets/queries/entry/touch_entry.sql"))
        .unwrap();
    let mut current = String::new();
    for part in &parts[..parts.len() - 1] {
        pst.execute(params![login, current, part])?;
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(part);
    }
    Ok(())
}

/// every file entry at or below the given folder path; an empty path means
/// all of the user's files
pub fn get_files_under(
    login: &str,
    folder_path: &str,
    con: &Connection,
) -> Result<Vec<SubtreeFile>, rusqlite::Error> {
    let mut files = Vec::new();
    if folder_path.is_empty() {
        let mut pst = con
            .prepare(include_str!(
                "../assets/queries/entry/get_files_under_root.sql"
            ))
            .unwrap();
        let mapped = pst.query_map(params![login], map_subtree_file)?;
        for file in mapped {
            files.push(file?);
        }
    } else {
        let mut pst = con
            .prepare(include_str!(
                "../assets/queries/entry/get_files_under_folder.sql"
            ))
            .unwrap();
        let mapped = pst.query_map(
            params![login, folder_path, like_prefix(folder_path)],
            map_subtree_file,
        )?;
        for file in mapped {
            files.push(file?);
        }
    }
    Ok(files)
}

/// every folder entry at or below the given folder path
pub fn get_folders_under(
    login: &str,
    folder_path: &str,
    con: &Connection,
) -> Result<Vec<SubtreeFolder>, rusqlite::Error> {
    let mut folders = Vec::new();
    if folder_path.is_empty() {
        let mut pst = con
            .prepare(include_str!(
                "../assets/queries/entry/get_folders_under_root.sql"
            ))
            .unwrap();
        let mapped = pst.query_map(params![login], map_subtree_folder)?;
        for folder in mapped {
            folders.push(folder?);
        }
    } else {
        let mut pst = con
            .prepare(include_str!(
                "../assets/queries/entry/get_folders_under_folder.sql"
            ))
            .unwrap();
        let mapped = pst.query_map(
            params![login, folder_path, like_prefix(folder_path)],
            map_subtree_folder,
        )?;
        for folder in mapped {
            folders.push(folder?);
        }
    }
    Ok(folders)
}

fn map_subtree_file(row: &rusqlite::Row) -> Result<SubtreeFile, rusqlite::Error> {
    Ok(SubtreeFile {
        parent_path: row.get(0)?,
        logical_name: row.get(1)?,
        physical_name: row.get(2)?,
    })
}

fn map_subtree_folder(row: &rusqlite::Row) -> Result<SubtreeFolder, rusqlite::Error> {
    Ok(SubtreeFolder {
        parent_path: row.get(0)?,
        logical_name: row.get(1)?,
    })
}

/// builds the LIKE pattern matching everything strictly below `path`.
/// Encrypted name tokens may contain `_`, which LIKE treats as a wildcard,
/// so the path's own characters get escaped
fn like_prefix(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len() + 2);
    for c in path.chars() {
        if c == '%' || c == '_' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push_str("/%");
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::open_connection;
    use crate::test::{cleanup, refresh_db};

    #[test]
    fn add_entry_is_idempotent() {
        refresh_db();
        let con = open_connection();
        add_entry("bob", "", "tok_a", "phys_a_folder", EntryKind::Folder, &con).unwrap();
        add_entry("bob", "", "tok_a", "phys_other", EntryKind::Folder, &con).unwrap();
        let children = get_child_entries("bob", "", &con).unwrap();
        con.close().unwrap();
        assert_eq!(1, children.len());
        // the second insert must not have replaced the physical name
        assert_eq!("phys_a_folder", children[0].physical_name);
        cleanup();
    }

    #[test]
    fn get_entry_not_found_is_no_rows() {
        refresh_db();
        let con = open_connection();
        let res = get_entry("bob", "", "missing", &con);
        con.close().unwrap();
        assert_eq!(Err(rusqlite::Error::QueryReturnedNoRows), res);
        cleanup();
    }

    #[test]
    fn deletion_set_covers_descendants() {
        refresh_db();
        let con = open_connection();
        add_entry("bob", "", "docs", "p_docs_folder", EntryKind::Folder, &con).unwrap();
        add_entry("bob", "docs", "inner", "p_inner_folder", EntryKind::Folder, &con).unwrap();
        add_entry("bob", "docs/inner", "f1", "p_f1", EntryKind::File, &con).unwrap();
        add_entry("bob", "", "other", "p_other", EntryKind::File, &con).unwrap();
        let (kind, mut physicals) = resolve_deletion_set("bob", "docs", &con).unwrap();
        con.close().unwrap();
        assert_eq!(EntryKind::Folder, kind);
        // the item's own physical name always comes first
        assert_eq!("p_docs_folder", physicals[0]);
        physicals.sort();
        assert_eq!(
            vec![
                "p_docs_folder".to_string(),
                "p_f1".to_string(),
                "p_inner_folder".to_string()
            ],
            physicals
        );
        cleanup();
    }

    #[test]
    fn deletion_set_for_file_is_only_itself() {
        refresh_db();
        let con = open_connection();
        add_entry("bob", "", "solo", "p_solo", EntryKind::File, &con).unwrap();
        let (kind, physicals) = resolve_deletion_set("bob", "solo", &con).unwrap();
        con.close().unwrap();
        assert_eq!(EntryKind::File, kind);
        assert_eq!(vec!["p_solo".to_string()], physicals);
        cleanup();
    }

    #[test]
    fn delete_subtree_removes_all_rows() {
        refresh_db();
        let mut con = open_connection();
        add_entry("bob", "", "docs", "p_docs_folder", EntryKind::Folder, &con).unwrap();
        add_entry("bob", "docs", "inner", "p_inner_folder", EntryKind::Folder, &con).unwrap();
        add_entry("bob", "docs/inner", "f1", "p_f1", EntryKind::File, &con).unwrap();
        add_entry("bob", "", "keep", "p_keep", EntryKind::File, &con).unwrap();
        delete_subtree("bob", "docs", &mut con).unwrap();
        let root = get_child_entries("bob", "", &con).unwrap();
        let nested = get_child_entries("bob", "docs/inner", &con).unwrap();
        con.close().unwrap();
        assert_eq!(1, root.len());
        assert_eq!("keep", root[0].logical_name);
        assert!(nested.is_empty());
        cleanup();
    }

    #[test]
    fn delete_subtree_does_not_cross_users() {
        refresh_db();
        let mut con = open_connection();
        add_entry("bob", "", "docs", "p_docs_folder", EntryKind::Folder, &con).unwrap();
        add_entry("eve", "", "docs", "p_docs_folder", EntryKind::Folder, &con).unwrap();
        delete_subtree("bob", "docs", &mut con).unwrap();
        let eves = get_child_entries("eve", "", &con).unwrap();
        con.close().unwrap();
        assert_eq!(1, eves.len());
        cleanup();
    }

    #[test]
    fn like_wildcards_in_names_do_not_overmatch() {
        refresh_db();
        let mut con = open_connection();
        // underscore in a sibling folder name must not be treated as a wildcard
        add_entry("bob", "", "a_b", "p_ab_folder", EntryKind::Folder, &con).unwrap();
        add_entry("bob", "", "axb", "p_axb_folder", EntryKind::Folder, &con).unwrap();
        add_entry("bob", "a_b", "f1", "p_f1", EntryKind::File, &con).unwrap();
        add_entry("bob", "axb", "f2", "p_f2", EntryKind::File, &con).unwrap();
        delete_subtree("bob", "a_b", &mut con).unwrap();
        let remaining = get_child_entries("bob", "axb", &con).unwrap();
        con.close().unwrap();
        assert_eq!(1, remaining.len());
        cleanup();
    }

    #[test]
    fn touch_ancestors_updates_each_level() {
        refresh_db();
        let con = open_connection();
        add_entry("bob", "", "a", "p_a_folder", EntryKind::Folder, &con).unwrap();
        add_entry("bob", "a", "b", "p_b_folder", EntryKind::Folder, &con).unwrap();
        add_entry("bob", "a/b", "f1", "p_f1", EntryKind::File, &con).unwrap();
        // force stale dates so the bump is observable
        con.execute("update entries set modified_date = 0", []).unwrap();
        touch_ancestors("bob", "a/b/f1", &con).unwrap();
        let root = get_child_entries("bob", "", &con).unwrap();
        let under_a = get_child_entries("bob", "a", &con).unwrap();
        let under_b = get_child_entries("bob", "a/b", &con).unwrap();
        con.close().unwrap();
        assert!(root[0].modified_date > 0);
        assert!(under_a[0].modified_date > 0);
        // the leaf itself is not an ancestor and stays untouched
        assert_eq!(0, under_b[0].modified_date);
        cleanup();
    }

    #[test]
    fn subtree_collectors_split_files_and_folders() {
        refresh_db();
        let con = open_connection();
        add_entry("bob", "", "docs", "p_docs_folder", EntryKind::Folder, &con).unwrap();
        add_entry("bob", "docs", "pics", "p_pics_folder", EntryKind::Folder, &con).unwrap();
        add_entry("bob", "docs", "f1", "p_f1", EntryKind::File, &con).unwrap();
        add_entry("bob", "docs/pics", "f2", "p_f2", EntryKind::File, &con).unwrap();
        add_entry("bob", "", "outside", "p_out", EntryKind::File, &con).unwrap();
        let files = get_files_under("bob", "docs", &con).unwrap();
        let folders = get_folders_under("bob", "docs", &con).unwrap();
        let everything = get_files_under("bob", "", &con).unwrap();
        con.close().unwrap();
        assert_eq!(2, files.len());
        assert_eq!(1, folders.len());
        assert_eq!("pics", folders[0].logical_name);
        assert_eq!(3, everything.len());
        cleanup();
    }
}
