//! End-to-end publishing tests: notes on disk, a fake Confluence site.

mod common;

use std::fs;

use common::fake_confluence::FakeConfluenceClient;
use common::fixtures;
use confluence_publish::note::NoteLookup;
use confluence_publish::publisher::Publisher;
use confluence_publish::vault::Vault;

fn vault_dir() -> tempfile::TempDir {
  let dir = tempfile::tempdir().unwrap();
  fs::create_dir_all(dir.path().join("assets/images")).unwrap();
  fs::write(dir.path().join("assets/images/horse.png"), "horse").unwrap();
  fs::write(
    dir.path().join("zoo.animals.md"),
    "---\nid: animals\ntitle: Animals\n---\n# Animals\n\n![Horse](/assets/images/horse.png)\n\nSee [[zoo.keepers]].\n",
  )
  .unwrap();
  fs::write(
    dir.path().join("zoo.keepers.md"),
    "---\nid: keepers\ntitle: Keepers\n---\nKeepers feed the [[animals]].\n",
  )
  .unwrap();
  dir
}

#[tokio::test]
async fn test_publish_persists_page_id_to_disk() {
  let dir = vault_dir();
  let vault = Vault::open(dir.path()).unwrap();
  let client = FakeConfluenceClient::new();
  let config = fixtures::config();
  let publisher = Publisher::new(&client, &vault, &config);

  let mut note = vault.resolve("zoo.animals").unwrap();
  let report = publisher.publish(&mut note).await.unwrap();

  assert!(report.created);
  assert_eq!(report.uploaded.len(), 1);
  assert_eq!(
    client.uploads(),
    vec![(
      "/assets/images/horse.png".to_string(),
      dir.path().join("assets/images/horse.png")
    )]
  );

  let reopened = Vault::open(dir.path()).unwrap();
  assert_eq!(
    reopened.find_note("animals").unwrap().page_id().as_deref(),
    Some(report.page.id.as_str())
  );
}

#[tokio::test]
async fn test_second_publish_reuses_page_and_links_published_notes() {
  let dir = vault_dir();
  let vault = Vault::open(dir.path()).unwrap();
  let client = FakeConfluenceClient::new();
  let config = fixtures::config();
  let publisher = Publisher::new(&client, &vault, &config);

  let mut keepers = vault.resolve("keepers").unwrap();
  publisher.publish(&mut keepers).await.unwrap();

  let mut animals = vault.resolve("animals").unwrap();
  let first = publisher.publish(&mut animals).await.unwrap();

  let page = client.page(&first.page.id).unwrap();
  let content = page.body.unwrap().storage.unwrap().value;
  insta::assert_snapshot!(content, @r#"
  <h1 id="animals">Animals</h1>
  <p><ac:image><ri:attachment ri:filename="/assets/images/horse.png"></ri:attachment></ac:image></p>
  <p>See <ac:link><ri:page ri:content-title="Keepers"></ri:page><ac:plain-text-link-body>Keepers</ac:plain-text-link-body></ac:link>.</p>
  "#);

  let mut animals = vault.resolve("animals").unwrap();
  let second = publisher.publish(&mut animals).await.unwrap();

  assert!(!second.created);
  assert_eq!(second.page.id, first.page.id);
  assert_eq!(second.page.version_number(), Some(3));
  assert_eq!(client.created_titles(), vec!["Keepers", "Animals"]);
}

#[tokio::test]
async fn test_published_version_is_recorded_for_next_publish() {
  let dir = vault_dir();
  let vault = Vault::open(dir.path()).unwrap();
  let client = FakeConfluenceClient::new();
  let config = fixtures::config();
  let publisher = Publisher::new(&client, &vault, &config);

  let mut keepers = vault.resolve("keepers").unwrap();
  let report = publisher.publish(&mut keepers).await.unwrap();
  vault
    .record_page_version(&mut keepers, report.page.version_number().unwrap())
    .await
    .unwrap();

  let reopened = Vault::open(dir.path()).unwrap();
  let stored = reopened.resolve("keepers").unwrap();
  assert_eq!(stored.page_version(), Some(2));
  assert_eq!(stored.page_id().as_deref(), Some(report.page.id.as_str()));
  assert_eq!(stored.body, "Keepers feed the [[animals]].\n");
}
