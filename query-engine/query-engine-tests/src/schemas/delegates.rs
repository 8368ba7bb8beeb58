use super::Fixture;
use indoc::indoc;

/// Owners and their assets. `Asset` is a delegate base told apart by `kind`,
/// with `Video` as its only concrete type. A video keeps its inherited fields
/// in the `Asset` row sharing its id.
pub fn assets() -> Fixture {
    let schema = indoc! {r#"
        {
          "provider": "sqlite",
          "models": {
            "Owner": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "name": { "type": "String" },
                "assets": { "type": "Asset", "array": true, "relation": { "opposite": "owner" } }
              }
            },
            "Asset": {
              "isDelegate": true,
              "subModels": ["Video"],
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "kind": { "type": "String", "isDiscriminator": true },
                "name": { "type": "String" },
                "ownerId": { "type": "Int" },
                "owner": {
                  "type": "Owner",
                  "relation": { "fields": ["ownerId"], "references": ["id"], "opposite": "assets" }
                }
              }
            },
            "Video": {
              "baseModel": "Asset",
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" }, "originModel": "Asset" },
                "kind": { "type": "String", "isDiscriminator": true, "originModel": "Asset" },
                "name": { "type": "String", "originModel": "Asset" },
                "ownerId": { "type": "Int", "originModel": "Asset" },
                "duration": { "type": "Int" }
              }
            }
          }
        }
    "#};

    let ddl = indoc! {r#"
        CREATE TABLE "Owner" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "name" TEXT NOT NULL
        );

        CREATE TABLE "Asset" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "kind" TEXT NOT NULL,
            "name" TEXT NOT NULL,
            "ownerId" INTEGER NOT NULL REFERENCES "Owner"("id") ON DELETE CASCADE
        );

        CREATE TABLE "Video" (
            "id" INTEGER PRIMARY KEY REFERENCES "Asset"("id") ON DELETE CASCADE,
            "duration" INTEGER NOT NULL
        );
    "#};

    Fixture { schema, ddl }
}
