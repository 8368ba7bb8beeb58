use super::Fixture;
use indoc::indoc;

/// Users in groups over the implicit `_GroupToUser` table. Private groups
/// cannot be read.
pub fn users_and_groups() -> Fixture {
    let schema = indoc! {r#"
        {
          "provider": "sqlite",
          "models": {
            "User": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "name": { "type": "String" },
                "groups": { "type": "Group", "array": true, "relation": { "opposite": "users" } }
              },
              "policies": [
                { "kind": "allow", "operations": ["all"], "condition": { "kind": "literal", "value": true } }
              ]
            },
            "Group": {
              "fields": {
                "id": { "type": "Int", "id": true, "default": { "call": "autoincrement" } },
                "name": { "type": "String" },
                "private": { "type": "Boolean", "default": false },
                "users": { "type": "User", "array": true, "relation": { "opposite": "groups" } }
              },
              "policies": [
                { "kind": "allow", "operations": ["create", "update"], "condition": { "kind": "literal", "value": true } },
                {
                  "kind": "allow",
                  "operations": ["read"],
                  "condition": { "kind": "unary", "op": "!", "operand": { "kind": "field", "name": "private" } }
                }
              ]
            }
          }
        }
    "#};

    let ddl = indoc! {r#"
        CREATE TABLE "User" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "name" TEXT NOT NULL
        );

        CREATE TABLE "Group" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "name" TEXT NOT NULL,
            "private" INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE "_GroupToUser" (
            "A" INTEGER NOT NULL REFERENCES "Group"("id") ON DELETE CASCADE,
            "B" INTEGER NOT NULL REFERENCES "User"("id") ON DELETE CASCADE,
            UNIQUE ("A", "B")
        );
    "#};

    Fixture { schema, ddl }
}
