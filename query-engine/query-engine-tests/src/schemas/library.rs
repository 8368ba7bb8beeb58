use super::Fixture;
use indoc::indoc;
use serde_json::{json, Value as JsonValue};

/// Authors and their books, without access rules. A book may have no author.
pub fn library() -> Fixture {
    let schema = indoc! {r#"
        {
          "provider": "sqlite",
          "models": {
            "Author": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "name": { "type": "String" },
                "books": { "type": "Book", "array": true, "relation": { "opposite": "author" } }
              }
            },
            "Book": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "title": { "type": "String", "unique": true },
                "genre": { "type": "String" },
                "pages": { "type": "Int" },
                "authorId": { "type": "Int", "optional": true },
                "author": {
                  "type": "Author",
                  "optional": true,
                  "relation": { "fields": ["authorId"], "references": ["id"], "opposite": "books" }
                }
              }
            }
          }
        }
    "#};

    let ddl = indoc! {r#"
        CREATE TABLE "Author" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "name" TEXT NOT NULL
        );

        CREATE TABLE "Book" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "title" TEXT NOT NULL UNIQUE,
            "genre" TEXT NOT NULL,
            "pages" INTEGER NOT NULL,
            "authorId" INTEGER REFERENCES "Author"("id") ON DELETE SET NULL
        );
    "#};

    Fixture { schema, ddl }
}

/// Five books with ids 1 to 5. Ann (author 1) wrote the first three, Bob
/// (author 2) the fourth, and the last has no author.
pub fn books() -> JsonValue {
    json!([
        { "title": "alpha", "genre": "fiction", "pages": 100, "authorId": 1 },
        { "title": "beta", "genre": "fiction", "pages": 200, "authorId": 1 },
        { "title": "gamma", "genre": "poetry", "pages": 50, "authorId": 1 },
        { "title": "delta", "genre": "poetry", "pages": 150, "authorId": 2 },
        { "title": "omega", "genre": "fiction", "pages": 300, "authorId": null }
    ])
}
