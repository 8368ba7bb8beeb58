use super::Fixture;
use indoc::indoc;

/// One model per kind of policy expression, each readable under a single
/// rule and creatable by anyone:
///
/// - `Project`: `tasks?[done]`, `Task` is unrestricted
/// - `Board`: `auth().role in ['admin', 'editor'] || level <= auth().level`
/// - `Article`: `contains(title, '50%') || has(tags, 'public')`
/// - `Stamp`: `shout(label) == 'HELLO'`, with `shout` provided by a plugin
pub fn expressions() -> Fixture {
    let schema = indoc! {r#"
        {
          "provider": "sqlite",
          "models": {
            "Project": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "name": { "type": "String" },
                "tasks": { "type": "Task", "array": true, "relation": { "opposite": "project" } }
              },
              "policies": [
                { "kind": "allow", "operations": ["create"], "condition": { "kind": "literal", "value": true } },
                {
                  "kind": "allow",
                  "operations": ["read"],
                  "condition": {
                    "kind": "binary",
                    "op": "?",
                    "left": { "kind": "field", "name": "tasks" },
                    "right": { "kind": "field", "name": "done" }
                  }
                }
              ]
            },
            "Task": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "done": { "type": "Boolean", "default": false },
                "projectId": { "type": "Int" },
                "project": {
                  "type": "Project",
                  "relation": { "fields": ["projectId"], "references": ["id"], "opposite": "tasks" }
                }
              },
              "policies": [
                { "kind": "allow", "operations": ["all"], "condition": { "kind": "literal", "value": true } }
              ]
            },
            "Board": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "level": { "type": "Int" }
              },
              "policies": [
                { "kind": "allow", "operations": ["create"], "condition": { "kind": "literal", "value": true } },
                {
                  "kind": "allow",
                  "operations": ["read"],
                  "condition": {
                    "kind": "binary",
                    "op": "||",
                    "left": {
                      "kind": "binary",
                      "op": "in",
                      "left": { "kind": "member", "receiver": { "kind": "auth" }, "member": "role" },
                      "right": {
                        "kind": "array",
                        "items": [{ "kind": "literal", "value": "admin" }, { "kind": "literal", "value": "editor" }]
                      }
                    },
                    "right": {
                      "kind": "binary",
                      "op": "<=",
                      "left": { "kind": "field", "name": "level" },
                      "right": { "kind": "member", "receiver": { "kind": "auth" }, "member": "level" }
                    }
                  }
                }
              ]
            },
            "Article": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "title": { "type": "String" },
                "tags": { "type": "String", "array": true }
              },
              "policies": [
                { "kind": "allow", "operations": ["create"], "condition": { "kind": "literal", "value": true } },
                {
                  "kind": "allow",
                  "operations": ["read"],
                  "condition": {
                    "kind": "binary",
                    "op": "||",
                    "left": {
                      "kind": "call",
                      "function": "contains",
                      "args": [{ "kind": "field", "name": "title" }, { "kind": "literal", "value": "50%" }]
                    },
                    "right": {
                      "kind": "call",
                      "function": "has",
                      "args": [{ "kind": "field", "name": "tags" }, { "kind": "literal", "value": "public" }]
                    }
                  }
                }
              ]
            },
            "Stamp": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "label": { "type": "String" }
              },
              "policies": [
                { "kind": "allow", "operations": ["create"], "condition": { "kind": "literal", "value": true } },
                {
                  "kind": "allow",
                  "operations": ["read"],
                  "condition": {
                    "kind": "binary",
                    "op": "==",
                    "left": { "kind": "call", "function": "shout", "args": [{ "kind": "field", "name": "label" }] },
                    "right": { "kind": "literal", "value": "HELLO" }
                  }
                }
              ]
            }
          }
        }
    "#};

    let ddl = indoc! {r#"
        CREATE TABLE "Project" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "name" TEXT NOT NULL
        );

        CREATE TABLE "Task" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "done" INTEGER NOT NULL DEFAULT 0,
            "projectId" INTEGER NOT NULL REFERENCES "Project"("id") ON DELETE CASCADE
        );

        CREATE TABLE "Board" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "level" INTEGER NOT NULL
        );

        CREATE TABLE "Article" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "title" TEXT NOT NULL,
            "tags" TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE "Stamp" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "label" TEXT NOT NULL
        );
    "#};

    Fixture { schema, ddl }
}
